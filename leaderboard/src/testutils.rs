use crate::Leaderboard;
use crate::cache::ResponseCache;
use crate::client::{BackendClient, build_http_client};
use crate::config::{Config, SourceConfig};
use crate::discovery::Discovery;
use crate::model::Source;
use crate::zones::ZoneDirectory;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn content_body(inner: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r><r><c>{inner}</c></r></r>")
}

pub fn error_body(message: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r><r><e><m>{message}</m></e></r></r>")
}

/// `GetLeagues` response from `(name, parent)` pairs.
pub fn leagues_body(leagues: &[(&str, &str)]) -> String {
    let inner: String = leagues
        .iter()
        .map(|(name, parent)| format!("<l><a>{name}</a><b>{parent}</b></l>"))
        .collect();
    content_body(&inner)
}

/// `GetLeaderBoardSummary` response from `(time, count)` pairs.
pub fn records_body(timestamp: i64, records: &[(i64, u32)]) -> String {
    let items: String = records
        .iter()
        .map(|(time, count)| format!("<i><s>{time}</s><c>{count}</c></i>"))
        .collect();
    content_body(&format!("<d>{timestamp}</d>{items}"))
}

/// One mock server per source, serving both the bootstrap endpoint at `/init`
/// and the relay endpoint at `/game/request.php`.
pub struct MockBackend {
    servers: BTreeMap<Source, MockServer>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let mut servers = BTreeMap::new();
        for source in Source::ALL {
            servers.insert(source, MockServer::start().await);
        }
        MockBackend { servers }
    }

    pub fn server(&self, source: Source) -> &MockServer {
        &self.servers[&source]
    }

    pub fn relay_url(&self, source: Source) -> String {
        format!("{}/game/request.php", self.server(source).uri())
    }

    /// Handshake answer pointing at the source's own mock server.
    pub fn waiting_params_body(&self, source: Source) -> String {
        content_body(&format!(
            "<ms><b>mock-{}</b><c>{}</c></ms>",
            source.slug(),
            self.server(source).address()
        ))
    }

    pub async fn mount_discovery(&self, source: Source) {
        Mock::given(method("POST"))
            .and(path("/init"))
            .and(body_string_contains("GetWaitingParams"))
            .respond_with(ResponseTemplate::new(200).set_body_string(self.waiting_params_body(source)))
            .mount(self.server(source))
            .await;
    }

    pub async fn mount_discovery_all(&self) {
        for source in Source::ALL {
            self.mount_discovery(source).await;
        }
    }

    pub async fn mount_leagues(&self, source: Source, leagues: &[(&str, &str)]) {
        Mock::given(method("POST"))
            .and(path("/game/request.php"))
            .and(body_string_contains("GetLeagues"))
            .respond_with(ResponseTemplate::new(200).set_body_string(leagues_body(leagues)))
            .mount(self.server(source))
            .await;
    }

    pub async fn mount_leagues_all(&self, leagues: &[(&str, &str)]) {
        for source in Source::ALL {
            self.mount_leagues(source, leagues).await;
        }
    }

    pub async fn mount_records(&self, source: Source, body: String) {
        Mock::given(method("POST"))
            .and(path("/game/request.php"))
            .and(body_string_contains("GetLeaderBoardSummary"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(self.server(source))
            .await;
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.backend.http_timeout_secs = 2;
        config.backend.fetch_timeout_secs = 2;
        config.backend.relay_scheme = "http".into();
        for source in Source::ALL {
            let bootstrap_url = Url::parse(&format!("{}/init", self.server(source).uri()))
                .expect("mock server uri");
            config
                .backend
                .sources
                .insert(source, SourceConfig { bootstrap_url });
        }
        config
    }

    pub fn discovery(&self) -> Discovery {
        let config = self.config();
        Discovery::new(
            build_http_client(&config.backend).unwrap(),
            Arc::new(config.backend.clone()),
            ResponseCache::new(config.cache.max_capacity),
            config.cache.relay_ttl(),
        )
    }

    pub fn client(&self) -> BackendClient {
        let config = self.config();
        BackendClient::new(build_http_client(&config.backend).unwrap(), self.discovery())
    }

    pub fn zone_directory(&self) -> ZoneDirectory {
        let config = self.config();
        ZoneDirectory::new(
            self.client(),
            ResponseCache::new(config.cache.max_capacity),
            config.cache.zones_ttl(),
        )
    }

    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard::new(&self.config()).unwrap()
    }
}
