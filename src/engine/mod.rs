// Quoting engine entrypoint
pub mod types;  // orders, books, engine request/result
pub mod book;   // building and measuring order books
pub mod co1;    // expected-volume / max-profit quoting

pub use types::*;

/// The computation behind the adapter: one quoting decision per call.
pub trait QuoteEngine {
    fn compute_orders(&self, request: &QuoteRequest<'_>) -> Result<NextOrders, EngineError>;
}

impl<E: QuoteEngine + ?Sized> QuoteEngine for &E {
    fn compute_orders(&self, request: &QuoteRequest<'_>) -> Result<NextOrders, EngineError> {
        (**self).compute_orders(request)
    }
}

impl<E: QuoteEngine + ?Sized> QuoteEngine for Box<E> {
    fn compute_orders(&self, request: &QuoteRequest<'_>) -> Result<NextOrders, EngineError> {
        (**self).compute_orders(request)
    }
}
