//! Python extension module: `import quotex_rs; quotex_rs.compute_orders(...)`.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::adapter;

/// Compute next buy/sell rates
#[pyfunction]
#[pyo3(name = "compute_orders")]
#[allow(non_snake_case, clippy::too_many_arguments)]
fn py_compute_orders(
    fee: f64,
    QL: f64,
    tick: f64,
    tuning1: Vec<f64>,
    tuning2: Vec<f64>,
    buy_rates: Vec<f64>,
    buy_quantities: Vec<f64>,
    sell_rates: Vec<f64>,
    sell_quantities: Vec<f64>,
) -> PyResult<(f64, f64)> {
    adapter::compute_orders_co1(
        fee,
        QL,
        tick,
        &tuning1,
        &tuning2,
        &buy_rates,
        &buy_quantities,
        &sell_rates,
        &sell_quantities,
    )
    .map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pymodule]
fn quotex_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__doc__", "Order quoting engine bindings")?;
    m.add_function(wrap_pyfunction!(py_compute_orders, m)?)?;
    Ok(())
}
