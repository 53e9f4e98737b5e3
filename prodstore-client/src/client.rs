//! High-level client API.

use crate::connection::Connection;
use crate::error::ClientError;
use prodstore_protocol::commands;
use prodstore_protocol::message::*;
use prodstore_protocol::{NewProduct, Product};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// High-level client for prodstore.
///
/// Cloning is cheap; clones share one connection and their requests are
/// serialized.
#[derive(Clone)]
pub struct Client {
    conn: Arc<Mutex<Connection>>,
}

impl Client {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Sends one liveness probe.
    pub async fn probe(&self) -> bool {
        self.conn.lock().await.probe().await
    }

    /// Closes the connection.
    pub async fn close(&self) {
        self.conn.lock().await.close();
    }

    /// Sends a request and returns the raw response, including error
    /// responses.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        self.conn.lock().await.request(&request).await
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    async fn request(&self, command: &str, args: Value) -> Result<Value, ClientError> {
        let response = self.execute(Request::new(command).with_args(args)).await?;

        if let Some(err) = response.error {
            return Err(ClientError::ServerError {
                retryable: err.code.is_retryable(),
                code: err.code,
                message: err.message,
            });
        }
        if response.status != ResponseStatus::Ok {
            return Err(ClientError::UnexpectedResponse(
                "error status without details".to_string(),
            ));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Value,
    ) -> Result<T, ClientError> {
        let result = self.request(command, args).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn request_products(&self, command: &str, args: Value) -> Result<Vec<Product>, ClientError> {
        let list: ProductList = self.request_as(command, args).await?;
        Ok(list.products)
    }

    // =========================================================================
    // Collection operations
    // =========================================================================

    pub async fn help(&self) -> Result<Vec<CommandDescription>, ClientError> {
        let help: HelpResult = self.request_as(commands::HELP, json!({})).await?;
        Ok(help.commands)
    }

    pub async fn info(&self) -> Result<InfoResult, ClientError> {
        self.request_as(commands::INFO, json!({})).await
    }

    /// Lists all products in natural order.
    pub async fn show(&self) -> Result<Vec<Product>, ClientError> {
        self.request_products(commands::SHOW, json!({})).await
    }

    pub async fn add(&self, product: NewProduct) -> Result<Product, ClientError> {
        self.request_as(commands::ADD, serde_json::to_value(product)?)
            .await
    }

    pub async fn update(&self, id: u64, product: NewProduct) -> Result<Product, ClientError> {
        let args = serde_json::to_value(UpdateParams { id, product })?;
        self.request_as(commands::UPDATE, args).await
    }

    pub async fn remove_by_id(&self, id: u64) -> Result<Product, ClientError> {
        self.request_as(commands::REMOVE_BY_ID, json!({ "id": id }))
            .await
    }

    /// Removes every product; returns how many were removed.
    pub async fn clear(&self) -> Result<u64, ClientError> {
        let result = self.request(commands::CLEAR, json!({})).await?;
        result["removed"]
            .as_u64()
            .ok_or_else(|| ClientError::UnexpectedResponse(result.to_string()))
    }

    /// Returns the first product, if the collection is not empty.
    pub async fn head(&self) -> Result<Option<Product>, ClientError> {
        let products = self.request_products(commands::HEAD, json!({})).await?;
        Ok(products.into_iter().next())
    }

    /// Adds the product if its price exceeds every stored price.
    ///
    /// Fails with a `CONDITION_NOT_MET` server error otherwise.
    pub async fn add_if_max(&self, product: NewProduct) -> Result<Product, ClientError> {
        self.request_as(commands::ADD_IF_MAX, serde_json::to_value(product)?)
            .await
    }

    /// Adds the product if its price is below every stored price.
    pub async fn add_if_min(&self, product: NewProduct) -> Result<Product, ClientError> {
        self.request_as(commands::ADD_IF_MIN, serde_json::to_value(product)?)
            .await
    }

    pub async fn sum_of_price(&self) -> Result<f64, ClientError> {
        let result: SumResult = self.request_as(commands::SUM_OF_PRICE, json!({})).await?;
        Ok(result.sum)
    }

    pub async fn filter_by_price(&self, price: f64) -> Result<Vec<Product>, ClientError> {
        self.request_products(commands::FILTER_BY_PRICE, json!({ "price": price }))
            .await
    }

    pub async fn filter_contains_part_number(
        &self,
        part: &str,
    ) -> Result<Vec<Product>, ClientError> {
        self.request_products(commands::FILTER_CONTAINS_PART_NUMBER, json!({ "part": part }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use prodstore_protocol::{Decoder, ErrorCode};
    use tokio::net::UdpSocket;

    /// Replies to every request with `reply` as a single chunk and returns
    /// the commands it saw.
    async fn canned_server(reply: &'static str) -> (std::net::SocketAddr, tokio::sync::mpsc::UnboundedReceiver<Request>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                if let Ok(request) = Decoder::decode_request(&buf[..n - 1]) {
                    let _ = tx.send(request);
                }
                let mut out = reply.as_bytes().to_vec();
                out.push(1);
                let _ = socket.send_to(&out, peer).await;
            }
        });
        (addr, rx)
    }

    async fn client_for(addr: std::net::SocketAddr) -> Client {
        Client::new(Connection::open(ConnectionConfig::new(addr)).await.unwrap())
    }

    #[tokio::test]
    async fn test_sum_of_price() {
        let (addr, mut seen) = canned_server(r#"{"status":"ok","result":{"sum":41.5}}"#).await;
        let client = client_for(addr).await;

        assert_eq!(client.sum_of_price().await.unwrap(), 41.5);
        assert_eq!(seen.recv().await.unwrap().command, commands::SUM_OF_PRICE);
    }

    #[tokio::test]
    async fn test_filter_sends_arguments() {
        let (addr, mut seen) = canned_server(r#"{"status":"ok","result":{"products":[]}}"#).await;
        let client = client_for(addr).await;

        let products = client.filter_contains_part_number("BOLT").await.unwrap();
        assert!(products.is_empty());

        let request = seen.recv().await.unwrap();
        assert_eq!(request.command, commands::FILTER_CONTAINS_PART_NUMBER);
        assert_eq!(request.args["part"], "BOLT");
    }

    #[tokio::test]
    async fn test_server_error_mapped() {
        let (addr, _seen) = canned_server(
            r#"{"status":"error","error":{"code":"NOT_FOUND","message":"product not found: 9"}}"#,
        )
        .await;
        let client = client_for(addr).await;

        let err = client.remove_by_id(9).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
        assert!(!err.is_retryable());
        assert!(!err.is_connection_error());
    }

    #[tokio::test]
    async fn test_clones_share_connection() {
        let (addr, _seen) = canned_server(r#"{"status":"ok","result":{"removed":3}}"#).await;
        let client = client_for(addr).await;
        let other = client.clone();

        assert_eq!(other.clear().await.unwrap(), 3);
        client.close().await;
        tokio_test::assert_err!(other.clear().await);
    }
}
