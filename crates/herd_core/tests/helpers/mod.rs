#![allow(dead_code)]

pub mod mock_upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use herd_config::{EnvOverrides, HerdConfig};
use herd_core::{Handler, Master};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct TestProxy {
    pub addr: SocketAddr,
    pub handler: Arc<Handler>,
    client: Client<HttpConnector, Full<Bytes>>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn x_cache(&self) -> &str {
        self.headers
            .get("x-cache")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestProxy {
    /// Run a proxy in front of `upstream` on an ephemeral port.
    pub async fn start(upstream: &str, ttl_secs: Option<u64>) -> Self {
        Self::start_with(upstream, |cfg| {
            if let Some(ttl) = ttl_secs {
                cfg.cache.ttl_secs = ttl;
            }
        })
        .await
    }

    /// Like [`TestProxy::start`], with a hook to adjust the loaded config.
    pub async fn start_with(upstream: &str, tweak: impl FnOnce(&mut HerdConfig)) -> Self {
        let env = EnvOverrides {
            target_server_url: Some(upstream.to_string()),
            ..EnvOverrides::default()
        };
        let mut cfg = HerdConfig::load_with("/nonexistent/herd.conf", &env).unwrap();
        tweak(&mut cfg);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let master = Master::new(cfg);
        let handler = master.handler().clone();
        tokio::spawn(master.serve(listener));

        Self {
            addr,
            handler,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub async fn get(&self, path: &str) -> Reply {
        self.send(Method::GET, path, &[], Bytes::new()).await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Bytes,
    ) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("http://{}{}", self.addr, path));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let req = builder.body(Full::new(body)).unwrap();

        let resp = self.client.request(req).await.unwrap();
        let (parts, body) = resp.into_parts();
        Reply {
            status: parts.status,
            headers: parts.headers,
            body: body.collect().await.unwrap().to_bytes(),
        }
    }
}
