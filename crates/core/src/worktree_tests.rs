// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn owner_key_is_composite() {
    let wt = WorktreeId::from_string("0192f0c1-aaaa-7abc-9def-0123456789ab");
    let user = UserId::from_string("0192f0c1-bbbb-7abc-9def-0123456789ab");
    assert_eq!(
        WorktreeOwner::key(&wt, &user),
        "0192f0c1-aaaa-7abc-9def-0123456789ab:0192f0c1-bbbb-7abc-9def-0123456789ab"
    );
}

#[test]
fn enums_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&FilesystemStatus::Creating).unwrap(), "\"creating\"");
    assert_eq!(serde_json::to_string(&OthersCan::Prompt).unwrap(), "\"prompt\"");
    assert_eq!(serde_json::to_string(&OthersFsAccess::Write).unwrap(), "\"write\"");
    assert_eq!(serde_json::to_string(&RefType::Sha).unwrap(), "\"sha\"");
}

#[test]
fn others_default_to_none() {
    assert_eq!(OthersCan::default(), OthersCan::None);
    assert_eq!(OthersFsAccess::default(), OthersFsAccess::None);
}
