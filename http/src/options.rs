//! Transport option maps for `url:` requests.

use weeslack_types::ProcessOptions;

/// `User-Agent` sent with every request.
#[must_use]
pub fn user_agent() -> String {
    format!("wee_slack {}", env!("CARGO_PKG_VERSION"))
}

/// Proxy the transport should tunnel through.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// `http`, `socks4` or `socks5`. Empty disables the proxy.
    pub proxy_type: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("proxy_type", &self.proxy_type)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProxyConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.proxy_type.is_empty()
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// `curl` command-line flag selecting this proxy, or an empty string when
    /// disabled.
    #[must_use]
    pub fn curl_argument(&self) -> String {
        if !self.is_enabled() {
            return String::new();
        }
        let user = self
            .credentials()
            .map(|(user, pass)| format!("{user}:{pass}@"))
            .unwrap_or_default();
        format!(
            "-x{}://{user}{}:{}",
            self.proxy_type, self.address, self.port
        )
    }

    fn apply(&self, options: &mut ProcessOptions) {
        if !self.is_enabled() {
            return;
        }
        options.insert("proxy".to_string(), self.address.clone());
        options.insert("proxyport".to_string(), self.port.to_string());
        options.insert("proxytype".to_string(), self.proxy_type.clone());
        if let Some((user, pass)) = self.credentials() {
            options.insert("proxyusername".to_string(), user.to_string());
            options.insert("proxypassword".to_string(), pass.to_string());
        }
    }
}

/// Per-workspace request settings.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub token: Option<String>,
    pub cookies: Option<String>,
    pub proxy: Option<ProxyConfig>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("cookies", &self.cookies.as_ref().map(|_| "[REDACTED]"))
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Option map handed to the process hook.
    #[must_use]
    pub fn to_process_options(&self) -> ProcessOptions {
        let mut options = ProcessOptions::new();
        options.insert("useragent".to_string(), user_agent());
        if let Some(token) = &self.token {
            options.insert(
                "httpheader".to_string(),
                format!("Authorization: Bearer {token}"),
            );
        }
        if let Some(cookies) = &self.cookies {
            options.insert("cookie".to_string(), cookies.clone());
        }
        if let Some(proxy) = &self.proxy {
            proxy.apply(&mut options);
        }
        options
    }
}
