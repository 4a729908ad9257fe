use std::future::Future;
use std::pin::Pin;

// For general flow operations
pub type FlowFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;
