use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Transport;
use crate::cast::cast;
use crate::cli::error::LwError;

pub(crate) const DEFAULT_RESULTS_PER_PAGE: u64 = 500;

/// One page of a list method, as the server sends it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PaginatedPage {
    pub(crate) item_count: u64,
    pub(crate) item_total: u64,
    pub(crate) items: Vec<Value>,
    pub(crate) page_num: u64,
    pub(crate) page_size: u64,
    pub(crate) page_total: u64,
}

/// Every page of a list method, concatenated in page order.
#[derive(Debug, Serialize)]
pub(crate) struct MergedList {
    pub(crate) items: Vec<Value>,
    pub(crate) merged_pages: u64,
    pub(crate) page_size: u64,
}

impl MergedList {
    /// Decodes each item into `T`.
    pub(crate) fn items_into<T: DeserializeOwned>(&self) -> Result<Vec<T>, LwError> {
        self.items.iter().map(cast::<T>).collect()
    }
}

/// Walks every page of `method`, one request at a time.
pub(crate) struct Pager<'a, T> {
    client: &'a T,
    method: &'a str,
    args: Map<String, Value>,
    results_per_page: u64,
}

impl<'a, T: Transport> Pager<'a, T> {
    pub(crate) fn new(client: &'a T, method: &'a str) -> Self {
        Self {
            client,
            method,
            args: Map::new(),
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
        }
    }

    /// Extra method arguments. Must be a mapping (or null).
    pub(crate) fn args(mut self, args: Value) -> Result<Self, LwError> {
        self.args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(LwError::input(
                    other.to_string(),
                    "method arguments",
                    "list method arguments must be a mapping",
                ));
            }
        };

        Ok(self)
    }

    pub(crate) fn results_per_page(mut self, results_per_page: u64) -> Self {
        self.results_per_page = results_per_page.max(1);
        self
    }

    pub(crate) async fn collect(self) -> Result<MergedList, LwError> {
        self.collect_with(|_| {}).await
    }

    /// Like [`Pager::collect`], calling `on_page` after each page arrives.
    #[tracing::instrument(skip_all, fields(method = %self.method, page_size = self.results_per_page))]
    pub(crate) async fn collect_with(
        self,
        mut on_page: impl FnMut(&PaginatedPage),
    ) -> Result<MergedList, LwError> {
        let mut args = self.args;
        args.insert(String::from("page_size"), self.results_per_page.into());

        let mut items = Vec::new();
        let mut merged_pages = 0;
        let mut page_num = 1;

        loop {
            args.insert(String::from("page_num"), page_num.into());

            let result = self
                .client
                .call(self.method, Value::Object(args.clone()))
                .await?;
            let page: PaginatedPage = cast(&result)?;

            // The first page may come back as 0 or 1 depending on the method.
            if page.page_num != page_num && !(page_num == 1 && page.page_num == 0) {
                return Err(LwError::DecodeMismatch {
                    path: String::from("$.page_num"),
                    expected: page_num.to_string(),
                    reason: format!("server returned page {}", page.page_num),
                });
            }

            tracing::debug!(
                page_num,
                page_total = page.page_total,
                items = page.items.len(),
                "fetched page"
            );
            on_page(&page);

            merged_pages += 1;
            let page_total = page.page_total;
            items.extend(page.items);

            if page_num >= page_total {
                break;
            }
            page_num += 1;
        }

        Ok(MergedList {
            items,
            merged_pages,
            page_size: self.results_per_page,
        })
    }
}
