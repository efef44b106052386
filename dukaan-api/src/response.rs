use axum::Json;
use serde::Serialize;
use dukaan_core::repository::Paginated;

/// `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

pub fn data<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse { data })
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u64,
}

/// `{"data": [...], "meta": {...}}`
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

pub fn paginated<T: Serialize>(page: Paginated<T>) -> Json<PageResponse<T>> {
    let meta = PageMeta {
        page: page.page.page,
        per_page: page.page.per_page,
        total: page.total,
        last_page: page.last_page(),
    };
    Json(PageResponse { data: page.items, meta })
}
