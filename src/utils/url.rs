use reqwest::Url;

/// 流媒体代理的默认路径
pub const DEFAULT_STREAM_PROXY: &str = "/api/stream";

/// 把外部 http(s) 资源改写为经由流媒体代理访问
///
/// 空串、已经指向代理的地址、非 http(s) 或无法解析的地址原样返回。
pub fn to_proxy_url(url: &str, proxy: &str) -> String {
    if url.is_empty() || url.starts_with(proxy) {
        return url.to_string();
    }

    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            format!("{}?url={}", proxy, urlencoding::encode(url))
        }
        _ => url.to_string(),
    }
}
