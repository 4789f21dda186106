use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use tracing::{debug, warn};

/// 设置用户代理，分别是 iPhone Safari, Mac Chrome
const USER_AGENTS: [&str; 2] = [
    "Mozilla/5.0 (iPhone; CPU iPhone OS 12_1_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/72.0.3626.109 Safari/537.36",
];

/// 请求时使用的浏览器身份，不同身份拿到的页面版式不同
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAgentProfile {
    Mobile,
    Desktop,
}

impl UserAgentProfile {
    pub fn header_value(self) -> &'static str {
        match self {
            UserAgentProfile::Mobile => USER_AGENTS[0],
            UserAgentProfile::Desktop => USER_AGENTS[1],
        }
    }
}

/// 下载结果：页面内容，或获取失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Loaded(String),
    Failed,
}

/// 页面来源，默认实现是 [`PageFetcher`]
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str, profile: UserAgentProfile, encoding: &str) -> Page;
}

pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn try_fetch(
        &self,
        url: &str,
        profile: UserAgentProfile,
        encoding: &str,
    ) -> reqwest::Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, profile.header_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("请求 {} 返回状态码 {}", url, status);
            return Ok(None);
        }

        // 按指定编码解码页面
        let html = response.text_with_charset(encoding).await?;
        Ok(Some(html))
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, url: &str, profile: UserAgentProfile, encoding: &str) -> Page {
        debug!("正在获取: {} ({:?}, {})", url, profile, encoding);

        match self.try_fetch(url, profile, encoding).await {
            Ok(Some(html)) => Page::Loaded(html),
            Ok(None) => Page::Failed,
            Err(e) => {
                warn!("获取 {} 失败: {}", url, e);
                Page::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 在本机起一个只应答一次的服务，返回其网址
    async fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[test]
    fn test_profiles_map_to_distinct_agents() {
        assert!(UserAgentProfile::Mobile.header_value().contains("iPhone"));
        assert!(UserAgentProfile::Desktop.header_value().contains("Macintosh"));
    }

    #[tokio::test]
    async fn test_error_status_is_failed_page() {
        let url = serve_once("404 Not Found", b"<html>not found</html>").await;
        let fetcher = PageFetcher::new(Duration::from_secs(5)).unwrap();
        let page = fetcher.fetch(&url, UserAgentProfile::Mobile, "utf-8").await;
        assert_eq!(page, Page::Failed);
    }

    #[tokio::test]
    async fn test_body_decoded_with_requested_encoding() {
        // "第十章 你好" 的 GBK 编码
        const GBK_BODY: &[u8] = &[
            0xB5, 0xDA, 0xCA, 0xAE, 0xD5, 0xC2, 0x20, 0xC4, 0xE3, 0xBA, 0xC3,
        ];
        let url = serve_once("200 OK", GBK_BODY).await;
        let fetcher = PageFetcher::new(Duration::from_secs(5)).unwrap();
        let page = fetcher.fetch(&url, UserAgentProfile::Desktop, "gbk").await;
        assert_eq!(page, Page::Loaded("第十章 你好".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_failed_page() {
        // 取一个刚释放的端口，确保没有监听
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = PageFetcher::new(Duration::from_secs(2)).unwrap();
        let page = fetcher
            .fetch(&format!("http://{addr}/"), UserAgentProfile::Mobile, "utf-8")
            .await;
        assert_eq!(page, Page::Failed);
    }
}
