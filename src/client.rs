use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

use crate::data::Location;
use crate::ordering::{Ordering, Rule};
use crate::protocol::{self, FrameError, Request, Response};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Sends one request per connection to a query server.
#[derive(Debug, Clone)]
pub struct QueryClient {
    addr: String,
    location: Location,
    name: Option<String>,
}

impl QueryClient {
    /// `addr` is anything `host:port` shaped, resolved on every query.
    pub fn new(addr: impl Into<String>, location: Location) -> Self {
        Self {
            addr: addr.into(),
            location,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub async fn query(
        &self,
        text: &str,
        ordering: Ordering,
        rule: Rule,
        limit: Option<usize>,
    ) -> Result<Response, ClientError> {
        let request = Request {
            name: self.name.clone(),
            query: text.to_owned(),
            location: (&self.location).into(),
            ordering,
            rule,
            limit,
        };
        let mut stream =
            TcpStream::connect(self.addr.as_str())
                .await
                .map_err(|source| ClientError::Connect {
                    addr: self.addr.clone(),
                    source,
                })?;
        debug!(addr = %self.addr, query = text, "Sending query");
        protocol::send(&mut stream, &request).await?;
        Ok(protocol::receive(&mut stream).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::data::Restaurant;
    use crate::dataset::Record;
    use crate::engine::QueryEngine;
    use crate::index::{IndexOptions, SearchIndex};
    use crate::pipeline::StopWords;
    use crate::server::{QueryServer, ServerConfig};

    #[tokio::test]
    async fn round_trips_through_a_live_server() {
        let near = Restaurant::new("Near", None, Location::new(43.45, 42.25));
        let far = Restaurant::new("Far", None, Location::new(50.0, 30.0));
        let records = vec![
            Record::new(far, "borscht", 5.0),
            Record::new(near, "borscht with cream", 6.0),
        ];
        let index =
            SearchIndex::build(&records, StopWords::from_text("with"), &IndexOptions::default())
                .unwrap();
        let engine = Arc::new(QueryEngine::new(Arc::new(index)));

        let server = QueryServer::bind(ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            pool_size: 1,
            io_timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(engine, async {
            let _ = stopped.await;
        }));

        let client = QueryClient::new(addr.to_string(), Location::new(43.45663, 42.253534))
            .with_name("test-client");
        let response = client
            .query("borsch", Ordering::ByLocation, Rule::Normal, Some(10))
            .await
            .unwrap();
        let data = response.data().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].restaurant.name, "Near");

        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn connection_failures_are_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = QueryClient::new(addr.to_string(), Location::NONE);
        let err = client
            .query("pizza", Ordering::ByRank, Rule::Normal, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }
}
