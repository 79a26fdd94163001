//! Round trips over a real socket: blocking client transport against the
//! async server.

#[cfg(test)]
mod tests {
    use crate::protocol::{Operation, ResponsePayload, WorkerRequest, WorkerResponse};
    use crate::transport::{TcpServer, TcpTransport, TransportConfig};
    use crate::DcexecError;

    async fn spawn_echo_server() -> String {
        let server = TcpServer::new("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server
                .run_with_handler(|req: WorkerRequest| async move {
                    match req.op {
                        Operation::Execute { stdin, .. } => {
                            WorkerResponse::success(req.id, ResponsePayload::Bytes(stdin))
                        }
                        other => WorkerResponse::error(req.id, format!("unsupported: {}", other.name())),
                    }
                })
                .await;
        });
        addr
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_client_against_async_server() {
        let addr = spawn_echo_server().await;

        let result = tokio::task::spawn_blocking(move || {
            let transport = TcpTransport::new(TransportConfig::default()).unwrap();
            let mut stream = transport.connect(&addr).unwrap();

            // Several requests on one connection
            let mut outputs = Vec::new();
            for payload in [&b"first"[..], b"", b"third"] {
                let request = WorkerRequest::new(Operation::Execute {
                    handle: "h".to_string(),
                    args: vec![],
                    stdin: payload.to_vec(),
                });
                outputs.push(transport.send_request(&mut stream, &request).unwrap());
            }

            let hello = WorkerRequest::new(Operation::Hello);
            let refused = transport.send_request(&mut stream, &hello).unwrap();
            (outputs, refused)
        })
        .await
        .unwrap();

        let (outputs, refused) = result;
        assert_eq!(outputs[0].result, Some(ResponsePayload::Bytes(b"first".to_vec())));
        assert_eq!(outputs[1].result, Some(ResponsePayload::Bytes(vec![])));
        assert_eq!(outputs[2].result, Some(ResponsePayload::Bytes(b"third".to_vec())));
        assert!(!refused.success);
        assert_eq!(refused.error.as_deref(), Some("unsupported: hello"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_answers_undecodable_frame_with_error() {
        let addr = spawn_echo_server().await;

        let response = tokio::task::spawn_blocking(move || {
            let transport = TcpTransport::default();
            let mut stream = transport.connect(&addr).unwrap();
            transport.send_message(&mut stream, b"{not json").unwrap();
            let data = transport.receive_message(&mut stream).unwrap();
            crate::transport::JsonCodec::decode_response(&data).unwrap()
        })
        .await
        .unwrap();

        assert!(!response.success);
        assert_eq!(response.id, 0);
    }

    #[test]
    fn test_oversized_frame_rejected_before_sending() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let transport = TcpTransport::default();
        let mut stream = transport.connect(&addr).unwrap();

        let huge = vec![0u8; crate::transport::MAX_MESSAGE_SIZE + 1];
        let err = transport.send_message(&mut stream, &huge).unwrap_err();
        assert!(matches!(err, DcexecError::InvalidRequest(_)));
    }
}
