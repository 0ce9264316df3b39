//! 共享请求模板
//!
//! 所有主机共享同一方法、路径与请求头，仅目标主机随尝试变化。
//! 每个主机的完整 URL 在构造时预先解析。

use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::error::DispatcherError;

/// 解析上下文路径时使用的占位基地址
const PLACEHOLDER_BASE: &str = "http://placeholder";

/// 单次尝试的出站请求
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// 解压后的负载
    pub body: Bytes,
}

/// 请求模板
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    headers: HeaderMap,
    /// 与主机列表一一对应
    targets: Vec<Url>,
}

impl RequestTemplate {
    /// 构造模板并为每个主机解析目标 URL
    ///
    /// # Errors
    /// 路径、方法、请求头或任一主机不合法时返回 `DispatcherError::Config`
    pub fn new(
        hosts: &[String],
        context_path: &str,
        method: &str,
        headers: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, DispatcherError> {
        let reference = parse_context_path(context_path)?;
        let method = parse_method(method)?;
        let headers = build_headers(headers)?;

        let targets = hosts
            .iter()
            .map(|host| resolve_target(host, &reference))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            method,
            headers,
            targets,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// 主机对应的目标 URL
    pub fn target(&self, host_index: usize) -> Option<&Url> {
        self.targets.get(host_index)
    }

    /// 为指定主机构造出站请求
    pub fn request_for(&self, host_index: usize, body: Bytes) -> Option<OutboundRequest> {
        let url = self.targets.get(host_index)?.clone();
        Some(OutboundRequest {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body,
        })
    }
}

/// 将上下文路径作为 URL 引用解析
fn parse_context_path(context_path: &str) -> Result<Url, DispatcherError> {
    let base = Url::parse(PLACEHOLDER_BASE)
        .map_err(|e| DispatcherError::config(format!("invalid placeholder base: {e}")))?;

    let reference = base.join(context_path.trim()).map_err(|e| {
        DispatcherError::config(format!("invalid context path '{context_path}': {e}"))
    })?;

    if reference.cannot_be_a_base() {
        return Err(DispatcherError::config(format!(
            "context path '{context_path}' is not a hierarchical URL path"
        )));
    }

    Ok(reference)
}

fn parse_method(method: &str) -> Result<Method, DispatcherError> {
    Method::from_bytes(method.trim().as_bytes())
        .map_err(|_| DispatcherError::config(format!("invalid HTTP method '{method}'")))
}

fn build_headers(headers: &BTreeMap<String, Vec<String>>) -> Result<HeaderMap, DispatcherError> {
    let mut map = HeaderMap::new();
    for (name, values) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| DispatcherError::config(format!("invalid header name '{name}'")))?;
        for value in values {
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                DispatcherError::config(format!("invalid value for header '{name}'"))
            })?;
            map.append(header_name.clone(), header_value);
        }
    }
    Ok(map)
}

/// 主机必须是纯 `host[:port]`，协议固定为 http
fn resolve_target(host: &str, reference: &Url) -> Result<Url, DispatcherError> {
    let host = host.trim();
    if host.is_empty() || host.contains(['/', '?', '#', '@']) || host.contains(char::is_whitespace)
    {
        return Err(DispatcherError::config(format!(
            "host '{host}' must be a bare host[:port]"
        )));
    }

    let mut url = Url::parse(&format!("http://{host}"))
        .map_err(|e| DispatcherError::config(format!("invalid host '{host}': {e}")))?;
    if url.host_str().is_none() {
        return Err(DispatcherError::config(format!("invalid host '{host}'")));
    }

    url.set_path(reference.path());
    url.set_query(reference.query());
    Ok(url)
}
