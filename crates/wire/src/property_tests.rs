// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol round-trip properties.

use crate::{decode, encode, FindQuery, Request, Response};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    // Any request survives an encode/decode round trip.
    #[test]
    fn request_round_trips(service in "[a-z-]{1,20}", id in "[0-9a-f-]{3,36}") {
        let req = Request::Get { service: service.clone(), id };
        let bytes = encode(&req).unwrap();
        let parsed: Request = decode(&bytes[4..]).unwrap();
        prop_assert_eq!(parsed, req);
    }

    // Frame prefix always matches body length.
    #[test]
    fn frame_prefix_matches_body(text in "\\PC{0,256}") {
        let resp = Response::Record { data: json!({"text": text}) };
        let bytes = encode(&resp).unwrap();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        prop_assert_eq!(len, bytes.len() - 4);
    }

    // Validation is idempotent: re-validating a validated query's
    // serialized form yields the same query.
    #[test]
    fn query_validation_is_idempotent(limit in 0u64..20_000, skip in 0u64..1000) {
        let raw = json!({"$limit": limit, "$skip": skip, "$sort": {"created_at": -1}});
        let first = FindQuery::validate(&raw).unwrap();

        let reserialized = json!({
            "$limit": first.limit,
            "$skip": first.skip,
            "$sort": {"created_at": -1},
        });
        let second = FindQuery::validate(&reserialized).unwrap();
        prop_assert_eq!(first, second);
    }
}
