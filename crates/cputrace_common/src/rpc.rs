//! Wire protocol shared by cputraced and cputracectl.
//!
//! Requests and responses travel as single JSON lines over the daemon's
//! Unix socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default daemon socket path.
pub const SOCKET_PATH: &str = "/run/cputrace/cputraced.sock";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Status,
    TraceUpload {
        payload: Value,
    },
    TraceList {
        offset: Option<usize>,
        limit: Option<usize>,
    },
    TraceShow {
        id: i64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Success { data: Value },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = Request::TraceShow { id: 7 };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("trace_show"));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        match parsed {
            Request::TraceShow { id } => assert_eq!(id, 7),
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_response_round_trip() {
        let response = Response::Error {
            message: "no such trace".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"error\""));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        match parsed {
            Response::Error { message } => assert_eq!(message, "no such trace"),
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
