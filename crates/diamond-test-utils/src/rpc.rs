//! One-shot JSON-RPC endpoint on localhost

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Answer the next HTTP request with `body` and return the endpoint URL
pub async fn serve_json_once(body: Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(socket);

        let mut length = 0;
        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap() > 0 && line != "\r\n" {
            if let Some((key, value)) = line.split_once(':') {
                if key.eq_ignore_ascii_case("content-length") {
                    length = value.trim().parse().unwrap();
                }
            }
            line.clear();
        }
        let mut request = vec![0; length];
        reader.read_exact(&mut request).await.unwrap();

        let payload = body.to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
            payload.len()
        );
        reader.get_mut().write_all(response.as_bytes()).await.unwrap();
    });
    url
}
