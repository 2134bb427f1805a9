use std::thread;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use greeting_core::tx::{Hash, Message, Transaction};
use greeting_core::{Pubkey, Signature};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ledger::{Account, ConnectionInfo, Lamports, LedgerTransport, TransportError};

const COMMITMENT: &str = "confirmed";

/// Upper bound on a single request, independent of confirmation waits.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Only plain and TLS http endpoints carry JSON-RPC.
fn check_url(url: &str) -> Result<(), TransportError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| TransportError::UnsupportedUrl(url.to_string()))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(TransportError::UnsupportedUrl(url.to_string()));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcAccount {
    lamports: u64,
    owner: String,
    executable: bool,
    data: (String, String),
}

#[derive(Deserialize)]
struct RpcBlockhash {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

/// JSON-RPC client for a ledger node.
pub struct RpcClient {
    url: String,
    agent: ureq::Agent,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcClient {
    pub fn new(url: &str, confirm_timeout: Duration) -> Result<Self, TransportError> {
        let url = url.trim();
        check_url(url)?;
        Ok(Self {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            confirm_timeout,
            poll_interval: Duration::from_millis(500),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, TransportError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: RpcResponse<T> = self
            .agent
            .post(&self.url)
            .set("Accept", "application/json")
            .send_json(request)
            .map_err(|err| self.http_error(err))?
            .into_json()
            .map_err(|e| TransportError::Decode(format!("{method}: {e}")))?;
        if let Some(err) = response.error {
            return Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| TransportError::Decode(format!("{method}: missing result")))
    }

    fn http_error(&self, err: ureq::Error) -> TransportError {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                TransportError::Http(format!("{}: status {code}: {body}", self.url))
            }
            ureq::Error::Transport(transport) => TransportError::Http(format!("{}: {transport}", self.url)),
        }
    }
}

fn account_from_rpc(raw: RpcAccount) -> Result<Account, TransportError> {
    let (payload, encoding) = raw.data;
    if encoding != "base64" {
        return Err(TransportError::Decode(format!("unexpected account encoding {encoding}")));
    }
    let data = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| TransportError::Decode(format!("account data: {e}")))?;
    let owner = raw
        .owner
        .parse()
        .map_err(|e| TransportError::Decode(format!("account owner: {e}")))?;
    Ok(Account {
        lamports: raw.lamports,
        data,
        owner,
        executable: raw.executable,
    })
}

fn parse_signature(text: &str) -> Result<Signature, TransportError> {
    text.parse()
        .map_err(|e| TransportError::Decode(format!("signature {text}: {e}")))
}

impl LedgerTransport for RpcClient {
    fn connection_info(&self) -> Result<ConnectionInfo, TransportError> {
        let version: Value = self.call("getVersion", json!([]))?;
        let version = version
            .get("solana-core")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Ok(ConnectionInfo {
            endpoint: self.url.clone(),
            version,
        })
    }

    fn account(&self, address: &Pubkey) -> Result<Option<Account>, TransportError> {
        let reply: WithContext<Option<RpcAccount>> = self.call(
            "getAccountInfo",
            json!([address.to_string(), { "encoding": "base64", "commitment": COMMITMENT }]),
        )?;
        reply.value.map(account_from_rpc).transpose()
    }

    fn balance(&self, address: &Pubkey) -> Result<Lamports, TransportError> {
        let reply: WithContext<u64> = self.call(
            "getBalance",
            json!([address.to_string(), { "commitment": COMMITMENT }]),
        )?;
        Ok(reply.value)
    }

    fn minimum_balance_for_rent_exemption(&self, size: usize) -> Result<Lamports, TransportError> {
        self.call("getMinimumBalanceForRentExemption", json!([size]))
    }

    fn fee_per_signature(&self) -> Result<Lamports, TransportError> {
        // fee of a message with a single signer and no instructions
        let mut message = Message::new(&[], &Pubkey::new([1u8; 32]))
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        message.recent_blockhash = self.latest_blockhash()?;
        let encoded = general_purpose::STANDARD.encode(message.serialize());
        let reply: WithContext<Option<u64>> = self.call(
            "getFeeForMessage",
            json!([encoded, { "commitment": COMMITMENT }]),
        )?;
        reply
            .value
            .ok_or_else(|| TransportError::Decode("fee unavailable for blockhash".into()))
    }

    fn latest_blockhash(&self) -> Result<Hash, TransportError> {
        let reply: WithContext<RpcBlockhash> =
            self.call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))?;
        reply
            .value
            .blockhash
            .parse()
            .map_err(|e| TransportError::Decode(format!("blockhash: {e}")))
    }

    fn request_airdrop(&mut self, to: &Pubkey, lamports: Lamports) -> Result<Signature, TransportError> {
        let sig: String = self.call(
            "requestAirdrop",
            json!([to.to_string(), lamports, { "commitment": COMMITMENT }]),
        )?;
        parse_signature(&sig)
    }

    fn confirm(&mut self, signature: &Signature) -> Result<(), TransportError> {
        let started = Instant::now();
        loop {
            let reply: WithContext<Vec<Option<RpcSignatureStatus>>> = self.call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": true }]),
            )?;
            if let Some(Some(status)) = reply.value.into_iter().next() {
                if let Some(err) = status.err.filter(|e| !e.is_null()) {
                    return Err(TransportError::Rejected(format!("{signature}: {err}")));
                }
                if matches!(
                    status.confirmation_status.as_deref(),
                    Some("confirmed") | Some("finalized")
                ) {
                    return Ok(());
                }
            }
            if started.elapsed() >= self.confirm_timeout {
                return Err(TransportError::Timeout {
                    waited: started.elapsed(),
                    what: format!("confirmation of {signature}"),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn send_and_confirm(&mut self, transaction: &Transaction) -> Result<Signature, TransportError> {
        let encoded = general_purpose::STANDARD.encode(transaction.serialize());
        let sig: String = self.call(
            "sendTransaction",
            json!([encoded, { "encoding": "base64", "preflightCommitment": COMMITMENT }]),
        )?;
        let signature = parse_signature(&sig)?;
        self.confirm(&signature)?;
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::TcpListener;

    use greeting_core::Keypair;

    /// Fake node answering one request per connection with the next canned
    /// body. Hands back the requests it answered.
    fn serve(replies: Vec<(u16, String)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for (status, reply) in replies {
                let (mut conn, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = conn.read(&mut buf).unwrap();
                    request.extend_from_slice(&buf[..n]);
                    if let Some(split) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&request[..split]).to_lowercase();
                        let len: usize = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .map(|v| v.trim().parse().unwrap())
                            .unwrap_or(0);
                        if request.len() >= split + 4 + len {
                            break;
                        }
                    }
                    if n == 0 {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.len(),
                    reply
                );
                conn.write_all(response.as_bytes()).unwrap();
                requests.push(String::from_utf8(request).unwrap());
            }
            requests
        });
        (url, handle)
    }

    fn ok(result: &str) -> (u16, String) {
        (200, format!(r#"{{"jsonrpc":"2.0","id":1,"result":{result}}}"#))
    }

    fn status(body: &str) -> (u16, String) {
        ok(&format!(r#"{{"context":{{"slot":1}},"value":[{body}]}}"#))
    }

    fn client(url: &str) -> RpcClient {
        let mut client = RpcClient::new(url, Duration::from_secs(5)).unwrap();
        client.poll_interval = Duration::from_millis(1);
        client
    }

    fn signed_transfer() -> Transaction {
        let payer = Keypair::generate();
        let mut tx = Transaction::new_unsigned(Message::new(&[], &payer.pubkey()).unwrap());
        tx.sign(&[&payer], Hash::new([7u8; 32])).unwrap();
        tx
    }

    #[test]
    fn tls_and_plain_endpoints_are_accepted() {
        assert!(RpcClient::new("https://api.devnet.solana.com", Duration::from_secs(1)).is_ok());
        assert!(RpcClient::new("http://localhost:8899", Duration::from_secs(1)).is_ok());
        assert!(RpcClient::new("http://[::1]:8899", Duration::from_secs(1)).is_ok());
        assert!(matches!(
            RpcClient::new("ws://localhost:8900", Duration::from_secs(1)),
            Err(TransportError::UnsupportedUrl(_))
        ));
        assert!(RpcClient::new("http://", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn cluster_url_from_cli_config_builds_a_client() {
        let config = crate::config::CliConfig::parse("json_rpc_url: \"https://api.devnet.solana.com\"\n");
        let url = crate::config::resolve_rpc_url(None, &Ok(config));
        assert_eq!(url, "https://api.devnet.solana.com");
        assert!(RpcClient::new(&url, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn account_info_decodes_base64_data() {
        let owner = Pubkey::new([5u8; 32]);
        let (url, server) = serve(vec![ok(&format!(
            r#"{{"context":{{"slot":1}},"value":{{"lamports":42,"owner":"{owner}","executable":false,"data":["AQID","base64"],"rentEpoch":0,"space":3}}}}"#
        ))]);
        let account = client(&url).account(&Pubkey::new([1u8; 32])).unwrap().unwrap();
        assert_eq!(account.lamports, 42);
        assert_eq!(account.owner, owner);
        assert_eq!(account.data, vec![1, 2, 3]);

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("POST / HTTP/1.1"));
        assert!(requests[0].contains("\"method\":\"getAccountInfo\""));
        assert!(requests[0].contains("\"encoding\":\"base64\""));
    }

    #[test]
    fn missing_accounts_are_none() {
        let (url, server) = serve(vec![ok(r#"{"context":{"slot":1},"value":null}"#)]);
        assert!(client(&url).account(&Pubkey::new([1u8; 32])).unwrap().is_none());
        server.join().unwrap();
    }

    #[test]
    fn rpc_errors_surface_code_and_message() {
        let (url, server) = serve(vec![(
            200,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid param"}}"#.into(),
        )]);
        let err = client(&url).balance(&Pubkey::new([1u8; 32])).unwrap_err();
        assert!(matches!(err, TransportError::Rpc { code: -32602, .. }));
        server.join().unwrap();
    }

    #[test]
    fn non_200_status_is_an_http_error() {
        let (url, server) = serve(vec![(503, "busy".into())]);
        let err = client(&url).balance(&Pubkey::new([1u8; 32])).unwrap_err();
        assert!(matches!(err, TransportError::Http(ref m) if m.contains("503")));
        server.join().unwrap();
    }

    #[test]
    fn confirm_polls_until_confirmed() {
        let (url, server) = serve(vec![
            status("null"),
            status(r#"{"slot":1,"confirmations":0,"err":null,"confirmationStatus":"processed"}"#),
            status(r#"{"slot":1,"confirmations":1,"err":null,"confirmationStatus":"confirmed"}"#),
        ]);
        client(&url).confirm(&Signature::new([4u8; 64])).unwrap();
        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.contains("getSignatureStatuses")));
    }

    #[test]
    fn failed_status_is_rejected() {
        let (url, server) = serve(vec![status(
            r#"{"slot":1,"confirmations":1,"err":{"InstructionError":[0,"AccountDataTooSmall"]},"confirmationStatus":"confirmed"}"#,
        )]);
        let err = client(&url).confirm(&Signature::new([4u8; 64])).unwrap_err();
        assert!(matches!(err, TransportError::Rejected(ref m) if m.contains("AccountDataTooSmall")));
        server.join().unwrap();
    }

    #[test]
    fn confirmation_gives_up_after_the_deadline() {
        let (url, server) = serve(vec![status("null")]);
        let mut client = client(&url);
        client.confirm_timeout = Duration::ZERO;
        let err = client.confirm(&Signature::new([4u8; 64])).unwrap_err();
        assert!(matches!(err, TransportError::Timeout { ref what, .. } if what.contains("confirmation")));
        server.join().unwrap();
    }

    #[test]
    fn send_and_confirm_submits_base64_and_waits() {
        let tx = signed_transfer();
        let signature = tx.signatures[0];
        let (url, server) = serve(vec![
            ok(&format!(r#""{signature}""#)),
            status(r#"{"slot":2,"confirmations":null,"err":null,"confirmationStatus":"finalized"}"#),
        ]);
        assert_eq!(client(&url).send_and_confirm(&tx).unwrap(), signature);

        let requests = server.join().unwrap();
        let encoded = general_purpose::STANDARD.encode(tx.serialize());
        assert!(requests[0].contains("\"method\":\"sendTransaction\""));
        assert!(requests[0].contains(&encoded));
        assert!(requests[1].contains(&signature.to_string()));
    }

    #[test]
    fn airdrop_returns_the_node_signature() {
        let signature = Signature::new([6u8; 64]);
        let (url, server) = serve(vec![ok(&format!(r#""{signature}""#))]);
        let to = Pubkey::new([1u8; 32]);
        assert_eq!(client(&url).request_airdrop(&to, 1_500_000).unwrap(), signature);
        let requests = server.join().unwrap();
        assert!(requests[0].contains("\"method\":\"requestAirdrop\""));
        assert!(requests[0].contains("1500000"));
    }

    #[test]
    fn fee_is_quoted_for_a_single_signature_message() {
        let blockhash = Hash::new([8u8; 32]);
        let (url, server) = serve(vec![
            ok(&format!(
                r#"{{"context":{{"slot":1}},"value":{{"blockhash":"{blockhash}","lastValidBlockHeight":10}}}}"#
            )),
            ok(r#"{"context":{"slot":1},"value":5000}"#),
        ]);
        assert_eq!(client(&url).fee_per_signature().unwrap(), 5_000);
        let requests = server.join().unwrap();
        assert!(requests[0].contains("getLatestBlockhash"));
        assert!(requests[1].contains("getFeeForMessage"));
    }
}
