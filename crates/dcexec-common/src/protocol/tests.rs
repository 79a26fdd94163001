//! Tests for the worker protocol types

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_id_uniqueness() {
        let ids: HashSet<_> = (0..1000)
            .map(|_| WorkerRequest::new(Operation::Hello).id)
            .collect();
        assert_eq!(ids.len(), 1000, "All request IDs should be unique");
    }

    #[test]
    fn test_upload_bytes_travel_as_base64() {
        let req = WorkerRequest::new(Operation::Upload {
            binary: vec![0x7f, b'E', b'L', b'F'],
        });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["op"], "upload");
        assert_eq!(value["binary"], "f0VMRg==");

        let back: WorkerRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_execute_args_default_to_empty() {
        let json = r#"{"id": 1, "op": "execute", "handle": "/tmp/x", "stdin": ""}"#;
        let req: WorkerRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req.op,
            Operation::Execute {
                handle: "/tmp/x".to_string(),
                args: vec![],
                stdin: vec![],
            }
        );
    }

    #[test]
    fn test_rejects_malformed_base64() {
        let json = r#"{"id": 1, "op": "upload", "binary": "***"}"#;
        assert!(serde_json::from_str::<WorkerRequest>(json).is_err());
    }

    #[test]
    fn test_store_operations_wire_names() {
        let req = WorkerRequest::new(Operation::StoreInTmp { key: "cfg".into() });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["op"], "store_in_tmp");
        assert_eq!(value["key"], "cfg");

        let json = r#"{"id": 4, "op": "delete_tmp"}"#;
        let req: WorkerRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.op, Operation::DeleteTmp);
        assert_eq!(req.op.name(), "delete_tmp");

        let put = Operation::Put {
            key: "k".into(),
            value: "v w".into(),
        };
        let back: Operation = serde_json::from_value(serde_json::to_value(&put).unwrap()).unwrap();
        assert_eq!(back, put);
    }

    #[test]
    fn test_count_payload_shape() {
        let value = serde_json::to_value(ResponsePayload::Count(3)).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "count", "value": 3}));
    }

    #[test]
    fn test_response_into_result() {
        let ok = WorkerResponse::success(1, ResponsePayload::Flag(true));
        assert_eq!(ok.into_result(), Ok(Some(ResponsePayload::Flag(true))));

        let failed = WorkerResponse::error(2, "binary not known");
        assert_eq!(failed.into_result(), Err("binary not known".to_string()));

        let bare = WorkerResponse {
            id: 3,
            result: None,
            error: None,
            success: false,
        };
        assert_eq!(bare.into_result(), Err("Unknown error".to_string()));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Hello.name(), "hello");
        assert_eq!(
            Operation::Remove {
                handle: "h".into()
            }
            .name(),
            "remove"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(DcexecError::Upload("x".into()).is_infrastructure());
        assert!(DcexecError::Execution("x".into()).is_infrastructure());
        assert!(!DcexecError::Marshal("x".into()).is_infrastructure());
        assert!(!DcexecError::EmptyClient.is_infrastructure());
        assert!(!DcexecError::InvalidServer.is_infrastructure());
        assert!(DcexecError::Store("x".into()).is_infrastructure());
    }

    #[test]
    fn test_file_error_message_names_step_and_path() {
        let err = DcexecError::file(
            FileErrorKind::Open,
            "/no/such/bin",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("could not open file /no/such/bin"), "{}", msg);
    }
}
