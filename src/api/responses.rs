//! Shared API response types
//!
//! Every success body carries `"success": true`. Listings add a `count`
//! of items on the page and a `pagination` block.

use serde::{Deserialize, Serialize};

use crate::models::{PagedResult, User};

/// Single-item response
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total: i64,
}

/// Paginated list response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<T>,
}

impl<T> From<PagedResult<T>> for ListResponse<T> {
    fn from(page: PagedResult<T>) -> Self {
        let pagination = Pagination {
            current_page: page.page,
            total_pages: page.total_pages(),
            total: page.total,
        };
        Self {
            success: true,
            count: page.items.len(),
            pagination,
            data: page.items,
        }
    }
}

/// Unpaginated list response
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionResponse<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> CollectionResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// Body of register/login/reset/update-password responses
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: User,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
