#![no_main]

use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use caldav_acl::{CalendarAcl, PermissionSet, ProfileDefaults};

const TOKENS: [&str; 14] = [
    "all",
    "read",
    "write",
    "write-properties",
    "write-content",
    "unlock",
    "read-acl",
    "read-current-user-privilege-set",
    "write-acl",
    "bind",
    "unbind",
    "C:read-free-busy",
    "C:schedule-deliver",
    "C:schedule-send",
];

const HREFS: [&str; 7] = [
    "/principals/bob/",
    "/principals/alice/",
    "http://www.example.com/acl/groups/maintainers",
    "/principals/a&b/",
    "/principals/<weird>/",
    "mailto:someone@example.com",
    "  /principals/padded/\n",
];

#[derive(Arbitrary, Debug)]
struct Perms(Vec<u8>);
impl Perms {
    fn set(&self) -> PermissionSet {
        PermissionSet::parse(self.0.iter().map(|i| TOKENS[*i as usize % TOKENS.len()]))
            .expect("known tokens are valid")
    }
}

#[derive(Arbitrary, Debug)]
enum Op {
    Add(u8, Perms),
    Remove(u8),
}

#[derive(Arbitrary, Debug)]
struct Input {
    owner: Perms,
    authenticated: Perms,
    unauthenticated: Perms,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    // 1. Build an ACL through the public API
    let mut acl = CalendarAcl::new(ProfileDefaults::new(
        input.owner.set(),
        input.authenticated.set(),
        input.unauthenticated.set(),
    ));
    for op in input.ops.iter() {
        match op {
            Op::Add(h, perms) => acl
                .add_principal_set(HREFS[*h as usize % HREFS.len()], perms.set())
                .expect("valid principal"),
            Op::Remove(h) => {
                acl.remove_principal(HREFS[*h as usize % HREFS.len()]);
            }
        }
    }

    // 2. Serialize then parse it back
    let doc = acl.to_xml().expect("xml serialization");
    let parsed = CalendarAcl::parse(&doc).expect("parse our own serialization");

    // 3. Both must be identical, including grant order
    assert_eq!(acl.profile_defaults(), parsed.profile_defaults());
    assert!(acl.principals().eq(parsed.principals()));
});
