//! Collaborator traits for generating and handling queued items
//!
//! Producers pull items from an [`ItemSource`], consumers push withdrawn items
//! into an [`ItemSink`]. Both traits are implemented for async closures so the
//! common case needs no dedicated type.

use async_trait::async_trait;
use std::future::Future;

/// Supplies the items a producer submits
#[async_trait]
pub trait ItemSource<T>: Send {
    /// Produce the item at position `index` of this producer's sequence
    async fn next_item(&mut self, index: usize) -> T;
}

/// Receives the items a consumer withdraws
#[async_trait]
pub trait ItemSink<T>: Send {
    async fn handle(&mut self, item: T);
}

#[async_trait]
impl<T, F, Fut> ItemSource<T> for F
where
    T: Send + 'static,
    F: FnMut(usize) -> Fut + Send,
    Fut: Future<Output = T> + Send + 'static,
{
    async fn next_item(&mut self, index: usize) -> T {
        (self)(index).await
    }
}

#[async_trait]
impl<T, F, Fut> ItemSink<T> for F
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&mut self, item: T) {
        (self)(item).await
    }
}
