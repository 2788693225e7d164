//! Scripted upload client shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use presigned_upload::callback::ByteProgress;
use presigned_upload::transport::{FormUpload, PartUpload};
use presigned_upload::{HttpResponse, Result, UploadClient, UploadError};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const SERVER_URL: &str = "https://app.example.com/api/upload";

/// A request seen by the fake client
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PostForm {
        url: String,
        fields: Vec<(String, String)>,
        file_field: String,
        file_name: String,
        len: usize,
    },
    PutPart {
        url: String,
        part_number: u32,
        content_disposition: Option<String>,
        len: usize,
    },
    PostJson {
        url: String,
        body: Value,
    },
    GetJson {
        url: String,
        authorization: String,
    },
}

#[derive(Default)]
pub struct FakeClient {
    calls: Mutex<Vec<Call>>,
    polls: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    failing: Mutex<HashMap<String, u16>>,
    hanging: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    descriptors: Mutex<Option<Value>>,
}

pub fn waiting() -> HttpResponse {
    HttpResponse::new(200, json!({"status": "still waiting"}).to_string())
}

pub fn done(data: Value) -> HttpResponse {
    HttpResponse::new(200, json!({"status": "done", "callbackData": data}).to_string())
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses for `polling_url`, in order. Once exhausted the url answers
    /// `done` with `{"polled": <url>}`.
    pub fn script_polls(&self, polling_url: &str, responses: Vec<HttpResponse>) {
        self.polls
            .lock()
            .unwrap()
            .insert(polling_url.to_string(), responses.into());
    }

    /// Answer every `still waiting` for `polling_url`
    pub fn never_done(&self, polling_url: &str) {
        self.script_polls(polling_url, vec![waiting(); 100_000]);
    }

    pub fn fail_url(&self, url: &str, status: u16) {
        self.failing.lock().unwrap().insert(url.to_string(), status);
    }

    /// Requests to `url` never finish
    pub fn hang_url(&self, url: &str) {
        self.hanging.lock().unwrap().insert(url.to_string());
    }

    /// Requests to `url` fail before any response arrives
    pub fn unreachable_url(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    /// Requests to `url` take `delay` before answering
    pub fn delay_url(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn serve_descriptors(&self, descriptors: Value) {
        *self.descriptors.lock().unwrap() = Some(descriptors);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::GetJson { .. }))
            .count()
    }

    pub fn json_posts_to(&self, action: &str) -> Vec<Value> {
        let needle = format!("actionType={}", action);
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PostJson { url, body } if url.contains(&needle) => Some(body),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn respond(&self, url: &str, ok: HttpResponse) -> Result<HttpResponse> {
        let hang = self.hanging.lock().unwrap().contains(url);
        if hang {
            futures::future::pending::<()>().await;
        }
        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let unreachable = self.unreachable.lock().unwrap().contains(url);
        if unreachable {
            return Err(UploadError::network("connection reset by peer"));
        }
        let failure = self.failing.lock().unwrap().get(url).copied();
        if let Some(status) = failure {
            return Ok(HttpResponse::new(status, "injected failure"));
        }
        tokio::task::yield_now().await;
        Ok(ok)
    }
}

#[async_trait]
impl UploadClient for FakeClient {
    async fn post_form(&self, form: FormUpload, progress: ByteProgress) -> Result<HttpResponse> {
        let len = form.body.len() as usize;
        self.record(Call::PostForm {
            url: form.url.clone(),
            fields: form.fields.clone(),
            file_field: form.file_field.clone(),
            file_name: form.file_name.clone(),
            len,
        });

        let response = self.respond(&form.url, HttpResponse::new(204, "")).await?;
        if response.is_success() {
            progress((len / 2) as u64);
            progress(len as u64);
        }
        Ok(response)
    }

    async fn put_part(&self, part: PartUpload, progress: ByteProgress) -> Result<HttpResponse> {
        let len = part.body.len();
        self.record(Call::PutPart {
            url: part.url.clone(),
            part_number: part.part_number,
            content_disposition: part.content_disposition.clone(),
            len,
        });

        let ok = HttpResponse::new(200, "").with_etag(format!("\"etag-{}\"", part.part_number));
        let response = self.respond(&part.url, ok).await?;
        if response.is_success() {
            progress(len as u64);
        }
        Ok(response)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        self.record(Call::PostJson {
            url: url.to_string(),
            body: body.clone(),
        });

        let ok = if url.contains("actionType=upload") {
            let descriptors = self.descriptors.lock().unwrap().clone();
            HttpResponse::new(200, descriptors.unwrap_or_else(|| json!([])).to_string())
        } else {
            HttpResponse::new(200, "{}")
        };
        self.respond(url, ok).await
    }

    async fn get_json(&self, url: &str, authorization: &str) -> Result<HttpResponse> {
        self.record(Call::GetJson {
            url: url.to_string(),
            authorization: authorization.to_string(),
        });

        let scripted = self
            .polls
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        let ok = scripted.unwrap_or_else(|| done(json!({ "polled": url })));
        self.respond(url, ok).await
    }
}

fn base(name: &str, key: &str) -> Value {
    json!({
        "key": key,
        "fileName": name,
        "fileUrl": format!("https://cdn.example.com/f/{}", key),
        "pollingJwt": format!("jwt-{}", key),
        "pollingUrl": format!("https://app.example.com/poll/{}", key),
        "contentDisposition": "inline",
        "customId": null,
        "fileType": "blob"
    })
}

fn merge(mut value: Value, extra: Value) -> Value {
    let object = value.as_object_mut().unwrap();
    for (k, v) in extra.as_object().unwrap() {
        object.insert(k.clone(), v.clone());
    }
    value
}

pub fn polling_url(key: &str) -> String {
    format!("https://app.example.com/poll/{}", key)
}

pub fn form_url(key: &str) -> String {
    format!("https://bucket.example.com/{}", key)
}

pub fn part_url(key: &str, part_number: u64) -> String {
    format!("https://bucket.example.com/{}/part/{}", key, part_number)
}

pub fn single_descriptor(name: &str, key: &str) -> Value {
    merge(
        base(name, key),
        json!({
            "url": form_url(key),
            "fields": {"key": key, "policy": "cG9saWN5", "x-amz-signature": "sig"}
        }),
    )
}

pub fn multi_descriptor(name: &str, key: &str, size: u64, chunk_size: u64) -> Value {
    let count = size.div_ceil(chunk_size);
    let urls: Vec<String> = (1..=count).map(|n| part_url(key, n)).collect();
    merge(
        base(name, key),
        json!({
            "urls": urls,
            "uploadId": format!("upload-{}", key),
            "chunkSize": chunk_size,
            "chunkCount": count
        }),
    )
}
