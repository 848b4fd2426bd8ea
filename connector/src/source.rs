use async_trait::async_trait;

use crate::rest::RestError;
use crate::types::{PageCursor, RequestsPage};

/// A paginated feed of upstream transaction requests.
///
/// The sync orchestrator only talks to this trait so tests can script pages.
#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RequestsPage, RestError>;
}

#[async_trait]
impl<T: RequestSource + ?Sized> RequestSource for std::sync::Arc<T> {
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RequestsPage, RestError> {
        (**self).fetch_page(cursor).await
    }
}
