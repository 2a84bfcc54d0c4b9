#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use chickadee::resolver::{HttpResponse, Transport, TransportError};
use serde_json::Value;

/// One request seen by [`Scripted`].
#[derive(Clone, Debug)]
pub struct Request {
    pub method: &'static str,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub at: Instant,
}

impl Request {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport that answers from a fixed script and records every request.
#[derive(Default)]
pub struct Scripted {
    replies: RefCell<VecDeque<HttpResponse>>,
    requests: RefCell<Vec<Request>>,
}

impl Scripted {
    pub fn new(replies: Vec<HttpResponse>) -> Rc<Self> {
        Rc::new(Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::default(),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    fn answer(
        &self,
        method: &'static str,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(Request {
            method,
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.cloned(),
            at: Instant::now(),
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| TransportError::new(url, "script exhausted"))
    }
}

impl Transport for Scripted {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.answer("GET", url, query, None)
    }

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        self.answer("POST", url, query, Some(body))
    }
}

/// A 200 response carrying `body` as JSON.
pub fn ok_json(body: Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

/// ip-api style batch answer echoing every address as a success.
pub fn batch_echo(addresses: &[String]) -> HttpResponse {
    let items: Vec<Value> = addresses
        .iter()
        .map(|a| serde_json::json!({"query": a, "status": "success"}))
        .collect();
    ok_json(Value::Array(items))
        .with_header("X-Rl", "14")
        .with_header("X-Ttl", "60")
}
