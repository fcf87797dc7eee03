//! Shared fixtures: an offline ledger seeded with a bridge-redemption
//! world, plus the session program that resolves against it.

use anyhow::Result;
use serde_json::json;

use ptb_resolver::Session;
use ptb_transport::{ChildEntry, MemoryLedger};
use ptb_types::{LookupKind, LookupQuery, MoveTarget, ObjectAddr};

pub fn addr(n: u8) -> ObjectAddr {
    let mut raw = [0u8; 32];
    raw[31] = n;
    ObjectAddr(raw)
}

pub fn bridge() -> ObjectAddr {
    addr(0xB1)
}

pub fn redeem_package() -> ObjectAddr {
    addr(0xAA)
}

pub fn treasury() -> ObjectAddr {
    addr(0xCC)
}

pub fn verifier() -> ObjectAddr {
    addr(0xDD)
}

/// Ledger world the redemption flow resolves against.
pub fn redemption_ledger() -> MemoryLedger {
    MemoryLedger::new()
        .with_object(
            bridge(),
            "0x77::bridge::Bridge",
            json!({ "state": { "treasury": treasury().to_hex() } }),
        )
        .with_child(
            bridge(),
            ChildEntry {
                name_type: "u8".into(),
                name_bytes: vec![0],
                value_type: Some(format!("{}::registry::Registry", redeem_package().to_hex())),
                value_json: json!({ "package": redeem_package().to_hex() }),
                ..Default::default()
            },
        )
        .with_child(bridge(), verifier_entry())
        .with_child(
            bridge(),
            ChildEntry {
                name_type: "vector<u8>".into(),
                name_bytes: b"coin_type".to_vec(),
                value_json: json!("0x2::sui::SUI"),
                ..Default::default()
            },
        )
        .with_program(redemption_session)
}

pub fn verifier_entry() -> ChildEntry {
    ChildEntry {
        name_type: "u8".into(),
        name_bytes: vec![1],
        value_type: Some("0x99::verifier::Verifier".into()),
        value_json: json!({ "authority": verifier().to_hex() }),
        ..Default::default()
    }
}

/// Session entry point for the redemption flow. Needs four data: the
/// redeem package, the verifier authority, the treasury address, and the
/// coin type. Builds a two-command sequence once everything is discovered.
pub fn redemption_session(payload: &[u8], discovered: &[u8]) -> Result<Vec<u8>> {
    let mut session = Session::new(discovered)?;

    let package = session.lookups.request_address(LookupQuery::new(
        "bridge.package",
        bridge(),
        LookupKind::ByTypeSuffix {
            type_suffix: "::registry::Registry".into(),
            field: "package".into(),
        },
    ))?;
    let verifier_auth = session.lookups.request_address(LookupQuery::new(
        "bridge.verifier",
        bridge(),
        LookupKind::ByTypeSuffix {
            type_suffix: "::verifier::Verifier".into(),
            field: "authority".into(),
        },
    ))?;
    let treasury_addr = session.lookups.request_address(LookupQuery::new(
        "bridge.treasury",
        bridge(),
        LookupKind::NestedPath {
            path: "state.treasury".into(),
        },
    ))?;
    let coin_type = session.lookups.request_string(LookupQuery::new(
        "bridge.coin_type",
        bridge(),
        LookupKind::RawField {
            key: b"coin_type".to_vec(),
        },
    ))?;

    if let (Some(package), Some(verifier_auth), Some(treasury_addr), Some(coin_type)) =
        (package, verifier_auth, treasury_addr, coin_type)
    {
        let b = &mut session.builder;
        let payload_in = b.add_pure(payload.to_vec(), "vector<u8>");
        let treasury_in = b.add_shared_object(treasury_addr);
        let verifier_in = b.add_shared_object(verifier_auth);
        let recipient_in = b.add_pure(addr(0xEE).as_bytes().to_vec(), "address");

        let payload_arg = b.arg(payload_in);
        let treasury_arg = b.arg(treasury_in);
        let verifier_arg = b.arg(verifier_in);
        let claim = b.move_call_with_arity(
            MoveTarget::new(package, "redeem", "claim"),
            vec![coin_type],
            vec![payload_arg, treasury_arg, verifier_arg],
            2,
        );
        let coin = b.nested_result(claim, 0)?;
        let receipt = b.nested_result(claim, 1)?;
        let recipient_arg = b.arg(recipient_in);
        b.transfer_objects(vec![coin, receipt], recipient_arg);
    }

    Ok(session.emit()?)
}
