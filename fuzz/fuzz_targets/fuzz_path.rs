// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for Path parsing, parent stripping and joins

#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_core::{Part, Path};

fn check_parts(path: &Path) {
    let s = path.as_str();
    let domain = path.domain();
    assert!(domain.is_empty() || domain.ends_with(':'));
    assert_eq!(format!("{}{}", domain, path.path()), s);
    assert_eq!(format!("{}{}", path.parents(), path.filename()), path.path());
    assert_eq!(format!("{}{}", path.stem(), path.extension()), path.filename());
    assert_eq!(path.is_absolute(), path.path().starts_with('/'));
    assert!(!path.filename().contains('/'));
    assert_eq!(path.part(Part::Extension), path.extension());
}

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let path = Path::new(input);
    check_parts(&path);
    assert_eq!(path.clone(), path);
    assert_eq!(path.clone().hash_value(), path.hash_value());

    // Repeated parent stripping reaches a fixed point.
    let mut current = path.clone();
    for _ in 0..=input.len() + 1 {
        let parent = current.parent_path();
        check_parts(&parent);
        assert_eq!(parent.domain(), path.domain());
        if parent == current {
            break;
        }
        current = parent;
    }

    // Split somewhere in the middle and join the halves back.
    let mid = input
        .char_indices()
        .map(|(i, _)| i)
        .nth(input.chars().count() / 2)
        .unwrap_or(input.len());
    let (left, right) = input.split_at(mid);
    let joined = Path::new(left) / Path::new(right);
    check_parts(&joined);
    assert!(joined.as_str().starts_with(left));
});
