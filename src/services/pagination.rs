use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    services::http::{HttpRequest, HttpTransport, TransportError},
};

/// Walks longer than this fail instead of returning a partial collection
const MAX_PAGES: u64 = 100;

/// Walks a `page`/`pageSize` collection until the upstream reports the last page
///
/// `template` carries the endpoint and headers; the paging parameters are
/// appended per request. Items from the array named `items_field` are
/// concatenated in ascending page order. Any non-2xx page aborts the walk,
/// and so does a collection that reports more than `MAX_PAGES` pages.
pub async fn fetch_all_pages<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    template: &HttpRequest,
    page_size: u32,
    items_field: &str,
) -> AppResult<Vec<T>> {
    let mut collected = Vec::new();
    let mut page: u64 = 1;

    loop {
        let request = template
            .clone()
            .query("page", page)
            .query("pageSize", page_size);

        let response = transport.send(request).await?.error_for_status()?;
        let status = response.status;
        let body: Value = response.json()?;

        if let Some(items) = body.get(items_field).and_then(Value::as_array) {
            for item in items {
                let parsed = serde_json::from_value(item.clone())
                    .map_err(|e| TransportError::Decode(e.to_string()))?;
                collected.push(parsed);
            }
        }

        let reported_page = body.get("page").and_then(Value::as_u64).unwrap_or(page);
        let page_count = body
            .get("page_count")
            .and_then(Value::as_u64)
            .unwrap_or(reported_page);

        if reported_page >= page_count {
            break;
        }
        if page >= MAX_PAGES {
            tracing::error!(
                url = %template.url,
                page_count,
                "Pagination exceeded page limit"
            );
            return Err(AppError::upstream(
                status,
                format!("collection exceeds {MAX_PAGES} pages (reported {page_count})"),
            ));
        }
        page += 1;
    }

    tracing::debug!(
        url = %template.url,
        pages = page,
        items = collected.len(),
        "Fetched paginated collection"
    );

    Ok(collected)
}
