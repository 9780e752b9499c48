//! C ABI for the quote adapter.
//!
//! Sequences cross the boundary as (pointer, length) pairs. A null pointer is
//! accepted only together with a zero length.

use std::os::raw::c_char;
use std::slice;

use tracing::warn;

use crate::adapter::{compute_orders_co1, AdapterError};

pub const QUOTEX_OK: i32 = 0;
pub const QUOTEX_ERR_NULL_POINTER: i32 = 1;
pub const QUOTEX_ERR_LENGTH_MISMATCH: i32 = 2;
pub const QUOTEX_ERR_ENGINE: i32 = 3;

/// # Safety
/// `ptr` must be null with `len == 0`, or valid for `len` reads.
unsafe fn borrow<'a>(ptr: *const f64, len: usize) -> Option<&'a [f64]> {
    if ptr.is_null() {
        return (len == 0).then_some(&[][..]);
    }
    Some(slice::from_raw_parts(ptr, len))
}

/// Compute the next buy/sell rates with the default engine.
///
/// Writes the rates to `out_buy_rate` / `out_sell_rate` and returns
/// `QUOTEX_OK`, or one of the `QUOTEX_ERR_*` codes leaving the outputs
/// untouched.
///
/// # Safety
/// Every (pointer, length) pair must describe readable `f64` memory (or be
/// null with length 0). Output pointers must be valid for writes.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn quotex_compute_orders(
    fee: f64,
    quantity_limit: f64,
    tick: f64,
    tuning1: *const f64,
    tuning1_len: usize,
    tuning2: *const f64,
    tuning2_len: usize,
    buy_rates: *const f64,
    buy_rates_len: usize,
    buy_quantities: *const f64,
    buy_quantities_len: usize,
    sell_rates: *const f64,
    sell_rates_len: usize,
    sell_quantities: *const f64,
    sell_quantities_len: usize,
    out_buy_rate: *mut f64,
    out_sell_rate: *mut f64,
) -> i32 {
    if out_buy_rate.is_null() || out_sell_rate.is_null() {
        return QUOTEX_ERR_NULL_POINTER;
    }

    let inputs = (
        borrow(tuning1, tuning1_len),
        borrow(tuning2, tuning2_len),
        borrow(buy_rates, buy_rates_len),
        borrow(buy_quantities, buy_quantities_len),
        borrow(sell_rates, sell_rates_len),
        borrow(sell_quantities, sell_quantities_len),
    );
    let (Some(t1), Some(t2), Some(br), Some(bq), Some(sr), Some(sq)) = inputs else {
        warn!("Null sequence pointer with non-zero length");
        return QUOTEX_ERR_NULL_POINTER;
    };

    match compute_orders_co1(fee, quantity_limit, tick, t1, t2, br, bq, sr, sq) {
        Ok((buy_rate, sell_rate)) => {
            *out_buy_rate = buy_rate;
            *out_sell_rate = sell_rate;
            QUOTEX_OK
        }
        Err(AdapterError::LengthMismatch { .. }) => QUOTEX_ERR_LENGTH_MISMATCH,
        Err(AdapterError::Engine(_)) => QUOTEX_ERR_ENGINE,
    }
}

/// Get library version
#[no_mangle]
pub extern "C" fn quotex_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::ptr;

    #[test]
    fn test_ffi_reference_quote() {
        let x = [0.01, 0.1];
        let y = [0.8, 0.2];
        let br = [0.011, 0.010];
        let bq = [0.05, 0.1];
        let sr = [0.012, 0.013];
        let sq = [0.05, 0.1];
        let (mut buy, mut sell) = (0.0, 0.0);

        let status = unsafe {
            quotex_compute_orders(
                0.002, 0.1, 1e-8,
                x.as_ptr(), x.len(),
                y.as_ptr(), y.len(),
                br.as_ptr(), br.len(),
                bq.as_ptr(), bq.len(),
                sr.as_ptr(), sr.len(),
                sq.as_ptr(), sq.len(),
                &mut buy, &mut sell,
            )
        };
        assert_eq!(status, QUOTEX_OK);
        assert!((buy - 0.01000001).abs() < 1e-12);
        assert!((sell - 0.01299999).abs() < 1e-12);
    }

    #[test]
    fn test_ffi_empty_book_with_null_pointers() {
        let x = [0.01];
        let y = [1.0];
        let (mut buy, mut sell) = (0.0, 0.0);
        let status = unsafe {
            quotex_compute_orders(
                0.002, 0.1, 1e-8,
                x.as_ptr(), 1,
                y.as_ptr(), 1,
                ptr::null(), 0,
                ptr::null(), 0,
                ptr::null(), 0,
                ptr::null(), 0,
                &mut buy, &mut sell,
            )
        };
        assert_eq!(status, QUOTEX_OK);
        assert_eq!((buy, sell), (-1.0, -1.0));
    }

    #[test]
    fn test_ffi_error_codes() {
        let x = [0.01];
        let y = [1.0];
        let br = [1.0, 2.0];
        let bq = [1.0];
        let (mut buy, mut sell) = (7.0, 7.0);

        let status = unsafe {
            quotex_compute_orders(
                0.002, 0.1, 1e-8,
                x.as_ptr(), 1, y.as_ptr(), 1,
                br.as_ptr(), br.len(), bq.as_ptr(), bq.len(),
                ptr::null(), 0, ptr::null(), 0,
                &mut buy, &mut sell,
            )
        };
        assert_eq!(status, QUOTEX_ERR_LENGTH_MISMATCH);
        assert_eq!((buy, sell), (7.0, 7.0));

        let status = unsafe {
            quotex_compute_orders(
                0.002, 0.1, 1e-8,
                ptr::null(), 3, y.as_ptr(), 1,
                ptr::null(), 0, ptr::null(), 0,
                ptr::null(), 0, ptr::null(), 0,
                &mut buy, &mut sell,
            )
        };
        assert_eq!(status, QUOTEX_ERR_NULL_POINTER);

        let status = unsafe {
            quotex_compute_orders(
                0.002, 0.1, 0.0,
                x.as_ptr(), 1, y.as_ptr(), 1,
                ptr::null(), 0, ptr::null(), 0,
                ptr::null(), 0, ptr::null(), 0,
                &mut buy, &mut sell,
            )
        };
        assert_eq!(status, QUOTEX_ERR_ENGINE);

        let status = unsafe {
            quotex_compute_orders(
                0.002, 0.1, 1e-8,
                x.as_ptr(), 1, y.as_ptr(), 1,
                ptr::null(), 0, ptr::null(), 0,
                ptr::null(), 0, ptr::null(), 0,
                ptr::null_mut(), &mut sell,
            )
        };
        assert_eq!(status, QUOTEX_ERR_NULL_POINTER);
    }

    #[test]
    fn test_version() {
        let v = unsafe { CStr::from_ptr(quotex_version()) };
        assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
