//! GraphQL-backed ledger client.
//!
//! Blocking `ureq` client against a fullnode GraphQL endpoint. Covers the
//! four operations the protocol needs: dry-run of the session entry point,
//! object fetch, dynamic-field enumeration (cursor-paginated), and
//! dynamic-field point fetch by typed key.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::Engine as _;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use ptb_types::{MoveTarget, ObjectAddr};

use crate::{ChildEntry, LedgerClient, LedgerObject};

/// Page size for dynamic-field enumeration.
const DYNAMIC_FIELD_PAGE_SIZE: usize = 50;

/// Upper bound on enumerated dynamic fields per parent.
const DYNAMIC_FIELD_LIMIT: usize = 1000;

/// Gas settings for trial transactions. Never charged; the values only
/// need to pass the node's admission checks.
const TRIAL_GAS_PRICE: u64 = 1_000;
const TRIAL_GAS_BUDGET: u64 = 500_000_000;

/// Ledger client over a GraphQL endpoint.
pub struct GraphQLLedger {
    endpoint: String,
    agent: ureq::Agent,
    /// Entry point executed by every trial pass:
    /// `fn(payload: vector<u8>, discovered: vector<u8>)`.
    session_target: MoveTarget,
    /// Sender used for trial transactions; irrelevant to the outcome.
    sender: ObjectAddr,
}

impl GraphQLLedger {
    fn default_timeouts() -> (Duration, Duration) {
        (Duration::from_secs(30), Duration::from_secs(10))
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build()
    }

    /// Create a client for mainnet.
    pub fn mainnet(session_target: MoveTarget) -> Self {
        Self::new(
            &crate::network::default_graphql_endpoint("mainnet"),
            session_target,
        )
    }

    /// Create a client with a custom endpoint.
    pub fn new(endpoint: &str, session_target: MoveTarget) -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self::with_timeouts(endpoint, session_target, timeout, connect_timeout)
    }

    /// Create a client with explicit timeouts.
    pub fn with_timeouts(
        endpoint: &str,
        session_target: MoveTarget,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: Self::build_agent(timeout, connect_timeout),
            session_target,
            sender: ObjectAddr::ZERO,
        }
    }

    /// Set the sender used for trial transactions.
    pub fn with_sender(mut self, sender: ObjectAddr) -> Self {
        self.sender = sender;
        self
    }

    /// Execute a GraphQL query.
    fn query(&self, query: &str, variables: Option<Value>) -> Result<Value> {
        let body = json!({
            "query": query,
            "variables": variables.unwrap_or(Value::Null)
        });

        let response: Value = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| anyhow!("GraphQL request failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse GraphQL response: {}", e))?;

        if let Some(errors) = response.get("errors") {
            if let Some(arr) = errors.as_array() {
                if !arr.is_empty() {
                    let msg = arr[0]
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error");
                    return Err(anyhow!("GraphQL error: {}", msg));
                }
            }
        }

        response
            .get("data")
            .cloned()
            .ok_or_else(|| anyhow!("No data in GraphQL response"))
    }

    /// Fetch a single page of dynamic fields.
    fn fetch_dynamic_fields_page(
        &self,
        parent: ObjectAddr,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<(Vec<ChildEntry>, Option<String>)> {
        let query = r#"
            query GetDynamicFields($address: SuiAddress!, $limit: Int!, $after: String) {
                object(address: $address) {
                    dynamicFields(first: $limit, after: $after) {
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                        nodes {
                            name {
                                type { repr }
                                bcs
                            }
                            value {
                                __typename
                                ... on MoveObject {
                                    address
                                    version
                                    digest
                                    contents {
                                        type { repr }
                                        bcs
                                        json
                                    }
                                }
                                ... on MoveValue {
                                    type { repr }
                                    bcs
                                    json
                                }
                            }
                        }
                    }
                }
            }
        "#;

        let variables = json!({
            "address": parent.to_hex(),
            "limit": limit,
            "after": cursor,
        });

        let data = self.query(query, Some(variables))?;
        let fields = data
            .get("object")
            .and_then(|o| o.get("dynamicFields"))
            .ok_or_else(|| anyhow!("object {} not found", parent.to_hex_short()))?;

        let entries = fields
            .get("nodes")
            .and_then(|n| n.as_array())
            .map(|nodes| nodes.iter().filter_map(parse_child_entry).collect())
            .unwrap_or_default();

        let page_info = fields.get("pageInfo");
        let has_next = page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let next_cursor = if has_next {
            page_info
                .and_then(|p| p.get("endCursor"))
                .and_then(|c| c.as_str())
                .map(|s| s.to_string())
        } else {
            None
        };

        Ok((entries, next_cursor))
    }
}

impl LedgerClient for GraphQLLedger {
    fn dry_run(&self, payload: &[u8], discovered: &[u8]) -> Result<Vec<u8>> {
        let tx_bytes = trial_tx::encode(&self.session_target, self.sender, payload, discovered)?;
        let tx_b64 = base64::engine::general_purpose::STANDARD.encode(&tx_bytes);
        debug!(
            target = %self.session_target,
            bytes = tx_bytes.len(),
            "trial execution via dryRunTransactionBlock"
        );

        let query = r#"
            query DryRun($txBytes: String!) {
                dryRunTransactionBlock(txBytes: $txBytes) {
                    error
                    transaction {
                        effects {
                            events {
                                nodes {
                                    contents {
                                        type { repr }
                                        bcs
                                    }
                                }
                            }
                        }
                    }
                }
            }
        "#;

        let data = self.query(query, Some(json!({ "txBytes": tx_b64 })))?;
        let result = data
            .get("dryRunTransactionBlock")
            .ok_or_else(|| anyhow!("dry run returned no result"))?;

        if let Some(err) = result.get("error").and_then(|e| e.as_str()) {
            return Err(anyhow!("trial execution failed: {}", err));
        }

        let events = result
            .pointer("/transaction/effects/events/nodes")
            .and_then(|n| n.as_array())
            .ok_or_else(|| anyhow!("dry run returned no events"))?;

        // The session entry point emits exactly one resolution event; pick
        // the first event declared by its module.
        let wanted_prefix = format!(
            "{}::{}::",
            self.session_target.package.to_hex(),
            self.session_target.module
        );
        for event in events {
            let repr = event
                .pointer("/contents/type/repr")
                .and_then(|r| r.as_str())
                .unwrap_or("");
            if repr.starts_with(&wanted_prefix) {
                let bcs_b64 = event
                    .pointer("/contents/bcs")
                    .and_then(|b| b.as_str())
                    .ok_or_else(|| anyhow!("resolution event has no bcs payload"))?;
                return base64::engine::general_purpose::STANDARD
                    .decode(bcs_b64)
                    .context("resolution event bcs is not valid base64");
            }
        }
        Err(anyhow!(
            "trial execution emitted no event from {}",
            self.session_target
        ))
    }

    fn fetch_object(&self, addr: ObjectAddr) -> Result<LedgerObject> {
        let query = r#"
            query GetObject($address: SuiAddress!) {
                object(address: $address) {
                    address
                    version
                    digest
                    asMoveObject {
                        contents {
                            type { repr }
                            json
                        }
                    }
                }
            }
        "#;

        let data = self.query(query, Some(json!({ "address": addr.to_hex() })))?;
        let obj = data
            .get("object")
            .filter(|o| !o.is_null())
            .ok_or_else(|| anyhow!("object {} not found", addr.to_hex_short()))?;

        parse_ledger_object(obj).ok_or_else(|| {
            anyhow!("object {} has no readable contents", addr.to_hex_short())
        })
    }

    fn list_child_entries(&self, parent: ObjectAddr) -> Result<Vec<ChildEntry>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (mut entries, next) =
                self.fetch_dynamic_fields_page(parent, cursor.as_deref(), DYNAMIC_FIELD_PAGE_SIZE)?;
            all.append(&mut entries);
            if all.len() >= DYNAMIC_FIELD_LIMIT {
                all.truncate(DYNAMIC_FIELD_LIMIT);
                break;
            }
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        debug!(parent = %parent.to_hex_short(), count = all.len(), "enumerated child entries");
        Ok(all)
    }

    fn fetch_child_entry(
        &self,
        parent: ObjectAddr,
        key_type: &str,
        key_bytes: &[u8],
    ) -> Result<Option<ChildEntry>> {
        let key_b64 = base64::engine::general_purpose::STANDARD.encode(key_bytes);
        let query = r#"
            query GetDynamicFieldByName(
                $address: SuiAddress!,
                $nameType: String!,
                $nameBcs: Base64!
            ) {
                object(address: $address) {
                    dynamicField(name: { type: $nameType, bcs: $nameBcs }) {
                        name {
                            type { repr }
                            bcs
                        }
                        value {
                            __typename
                            ... on MoveObject {
                                address
                                version
                                digest
                                contents {
                                    type { repr }
                                    bcs
                                    json
                                }
                            }
                            ... on MoveValue {
                                type { repr }
                                bcs
                                json
                            }
                        }
                    }
                }
            }
        "#;

        let variables = json!({
            "address": parent.to_hex(),
            "nameType": key_type,
            "nameBcs": key_b64,
        });

        let data = self.query(query, Some(variables))?;
        let node = data
            .pointer("/object/dynamicField")
            .filter(|df| !df.is_null());
        Ok(node.and_then(parse_child_entry))
    }
}

/// Parse a GraphQL object node into a [`LedgerObject`].
fn parse_ledger_object(obj: &Value) -> Option<LedgerObject> {
    let address = obj
        .get("address")
        .and_then(|a| a.as_str())
        .and_then(|a| ObjectAddr::from_hex(a).ok())?;
    let version = obj.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
    let digest = obj
        .get("digest")
        .and_then(|d| d.as_str())
        .map(|s| s.to_string());
    let contents = obj.pointer("/asMoveObject/contents");
    let type_string = contents
        .and_then(|c| c.pointer("/type/repr"))
        .and_then(|r| r.as_str())
        .map(|s| s.to_string());
    let fields = contents
        .and_then(|c| c.get("json"))
        .cloned()
        .unwrap_or(Value::Null);
    Some(LedgerObject {
        address,
        version,
        digest,
        type_string,
        fields,
    })
}

/// Parse a dynamic-field node into a [`ChildEntry`].
fn parse_child_entry(node: &Value) -> Option<ChildEntry> {
    let name = node.get("name")?;
    let value = node.get("value")?;

    let name_type = name
        .pointer("/type/repr")
        .and_then(|r| r.as_str())
        .unwrap_or("")
        .to_string();
    let name_bytes = name
        .get("bcs")
        .and_then(|b| b.as_str())
        .and_then(|b| base64::engine::general_purpose::STANDARD.decode(b).ok())
        .unwrap_or_default();

    let is_object = value
        .get("__typename")
        .and_then(|t| t.as_str())
        .map(|t| t == "MoveObject")
        .unwrap_or(false);

    let (value_type, value_json, value_bytes) = if is_object {
        let contents = value.get("contents");
        (
            contents
                .and_then(|c| c.pointer("/type/repr"))
                .and_then(|r| r.as_str())
                .map(|s| s.to_string()),
            contents
                .and_then(|c| c.get("json"))
                .cloned()
                .unwrap_or(Value::Null),
            contents
                .and_then(|c| c.get("bcs"))
                .and_then(|b| b.as_str())
                .and_then(|b| base64::engine::general_purpose::STANDARD.decode(b).ok()),
        )
    } else {
        (
            value
                .pointer("/type/repr")
                .and_then(|r| r.as_str())
                .map(|s| s.to_string()),
            value.get("json").cloned().unwrap_or(Value::Null),
            value
                .get("bcs")
                .and_then(|b| b.as_str())
                .and_then(|b| base64::engine::general_purpose::STANDARD.decode(b).ok()),
        )
    };

    Some(ChildEntry {
        name_type,
        name_bytes,
        value_type,
        value_json,
        value_bytes,
        object_id: value
            .get("address")
            .and_then(|a| a.as_str())
            .and_then(|a| ObjectAddr::from_hex(a).ok()),
        version: value.get("version").and_then(|v| v.as_u64()),
        digest: value
            .get("digest")
            .and_then(|d| d.as_str())
            .map(|s| s.to_string()),
    })
}

/// Canonical encoding of the trial transaction.
///
/// Only the slice of the on-chain transaction layout a trial pass uses is
/// modeled: one programmable transaction with two pure inputs (payload,
/// encoded discovered-data table) and one call to the session entry point.
/// Variant order matches the on-chain layout; unused variants are not
/// represented.
mod trial_tx {
    use super::*;

    #[derive(Serialize)]
    enum TransactionData {
        V1(TransactionDataV1),
    }

    #[derive(Serialize)]
    struct TransactionDataV1 {
        kind: TransactionKind,
        sender: [u8; 32],
        gas_data: GasData,
        expiration: TransactionExpiration,
    }

    #[derive(Serialize)]
    enum TransactionKind {
        Programmable(ProgrammableTransaction),
    }

    #[derive(Serialize)]
    struct ProgrammableTransaction {
        inputs: Vec<CallArg>,
        commands: Vec<TrialCommand>,
    }

    #[derive(Serialize)]
    enum CallArg {
        Pure(Vec<u8>),
    }

    #[derive(Serialize)]
    enum TrialCommand {
        MoveCall(Box<ProgrammableMoveCall>),
    }

    #[derive(Serialize)]
    struct ProgrammableMoveCall {
        package: [u8; 32],
        module: String,
        function: String,
        type_arguments: Vec<String>,
        arguments: Vec<TrialArgument>,
    }

    #[derive(Serialize)]
    enum TrialArgument {
        // Holds discriminant 0; trial calls never pass the gas coin.
        #[allow(dead_code)]
        GasCoin,
        Input(u16),
    }

    #[derive(Serialize)]
    struct GasData {
        payment: Vec<([u8; 32], u64, Vec<u8>)>,
        owner: [u8; 32],
        price: u64,
        budget: u64,
    }

    #[derive(Serialize)]
    enum TransactionExpiration {
        None,
    }

    pub fn encode(
        target: &MoveTarget,
        sender: ObjectAddr,
        payload: &[u8],
        discovered: &[u8],
    ) -> Result<Vec<u8>> {
        // Pure inputs are the BCS of the value, here two vector<u8>.
        let inputs = vec![
            CallArg::Pure(bcs::to_bytes(&payload.to_vec())?),
            CallArg::Pure(bcs::to_bytes(&discovered.to_vec())?),
        ];
        let call = ProgrammableMoveCall {
            package: *target.package.as_bytes(),
            module: target.module.clone(),
            function: target.function.clone(),
            type_arguments: Vec::new(),
            arguments: vec![TrialArgument::Input(0), TrialArgument::Input(1)],
        };
        let data = TransactionData::V1(TransactionDataV1 {
            kind: TransactionKind::Programmable(ProgrammableTransaction {
                inputs,
                commands: vec![TrialCommand::MoveCall(Box::new(call))],
            }),
            sender: *sender.as_bytes(),
            gas_data: GasData {
                payment: Vec::new(),
                owner: *sender.as_bytes(),
                price: TRIAL_GAS_PRICE,
                budget: TRIAL_GAS_BUDGET,
            },
            expiration: TransactionExpiration::None,
        });
        Ok(bcs::to_bytes(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_object_child_entry() {
        let node = json!({
            "name": {
                "type": { "repr": "u64" },
                "bcs": base64::engine::general_purpose::STANDARD.encode(42u64.to_le_bytes()),
            },
            "value": {
                "__typename": "MoveObject",
                "address": "0xabc",
                "version": 7,
                "digest": "9V3x",
                "contents": {
                    "type": { "repr": "0x2::coin::Coin<0x2::sui::SUI>" },
                    "bcs": base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]),
                    "json": { "balance": "100" }
                }
            }
        });
        let entry = parse_child_entry(&node).unwrap();
        assert_eq!(entry.name_type, "u64");
        assert_eq!(entry.name_bytes, 42u64.to_le_bytes().to_vec());
        assert_eq!(entry.value_type.as_deref(), Some("0x2::coin::Coin<0x2::sui::SUI>"));
        assert_eq!(entry.value_bytes, Some(vec![1, 2, 3]));
        assert_eq!(entry.object_id, Some(ObjectAddr::from_hex("0xabc").unwrap()));
        assert_eq!(entry.version, Some(7));
    }

    #[test]
    fn parses_move_value_child_entry() {
        let node = json!({
            "name": { "type": { "repr": "vector<u8>" }, "bcs": null },
            "value": {
                "__typename": "MoveValue",
                "type": { "repr": "0x1::string::String" },
                "json": "0x2::sui::SUI"
            }
        });
        let entry = parse_child_entry(&node).unwrap();
        assert_eq!(entry.value_type.as_deref(), Some("0x1::string::String"));
        assert_eq!(entry.value_json, json!("0x2::sui::SUI"));
        assert!(entry.object_id.is_none());
    }

    #[test]
    fn parses_ledger_object() {
        let obj = json!({
            "address": "0x2",
            "version": 11,
            "digest": "Dg3s",
            "asMoveObject": {
                "contents": {
                    "type": { "repr": "0xdead::vault::Vault" },
                    "json": { "state": { "fee_bps": 30 } }
                }
            }
        });
        let parsed = parse_ledger_object(&obj).unwrap();
        assert_eq!(parsed.version, 11);
        assert_eq!(parsed.type_string.as_deref(), Some("0xdead::vault::Vault"));
        assert_eq!(parsed.fields.pointer("/state/fee_bps"), Some(&json!(30)));
    }

    #[test]
    fn trial_tx_encoding_is_deterministic() {
        let target = MoveTarget::parse("0xdead::resolver::resolve").unwrap();
        let a = trial_tx::encode(&target, ObjectAddr::ZERO, b"payload", b"").unwrap();
        let b = trial_tx::encode(&target, ObjectAddr::ZERO, b"payload", b"").unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
