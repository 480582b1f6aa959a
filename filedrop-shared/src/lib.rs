pub mod error;
pub mod file;
pub mod status;

pub struct AddrInfo {
    pub addr: String,
    pub port: u16,
    pub https: bool,
}

impl AddrInfo {
    pub fn as_url(&self) -> String {
        let scheme = match self.https {
            true => "https",
            false => "http",
        };
        format!("{}://{}:{}", scheme, self.addr, self.port)
    }

    pub fn as_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn from_env() -> Self {
        let https = match std::env::var("FILEDROP_HTTPS") {
            Ok(val) => val == "true",
            Err(_) => false,
        };

        let port: u16 = match std::env::var("FILEDROP_PORT") {
            Ok(val) => val.parse().unwrap_or(8189),
            Err(_) => 8189,
        };

        Self {
            addr: std::env::var("FILEDROP_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            https,
        }
    }
}
