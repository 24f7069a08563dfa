use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct List<T> {
    list: Vec<T>,
    total: i64,
}

impl<T> List<T> {
    pub fn new(list: Vec<T>, total: i64) -> Self {
        List { list, total }
    }
}

#[derive(Debug, Serialize)]
pub struct Message {
    message: String,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Message {
            message: message.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    deleted: u64,
}

impl DeleteResponse {
    pub fn new(deleted: u64) -> Self {
        DeleteResponse { deleted }
    }
}
