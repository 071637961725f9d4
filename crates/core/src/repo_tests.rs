// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    simple = { "acme/widgets", true },
    dots = { "acme/widgets.rs", true },
    dashes = { "my-org/my_repo", true },
    missing_name = { "acme/", false },
    missing_org = { "/widgets", false },
    no_slash = { "widgets", false },
    extra_slash = { "a/b/c", false },
    spaces = { "acme/my widgets", false },
)]
fn slug_validation(slug: &str, ok: bool) {
    assert_eq!(Repo::is_valid_slug(slug), ok, "slug {slug:?}");
}
