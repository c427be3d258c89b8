//! Sample schema and trees.

use converge_model::{ConfigTree, FieldSpec, MergePolicy, Schema, Value};

/// Schema used by the sample trees: an appendable `pkg` list, an
/// overridable `user`, an open `services` map and a closed `boot` map.
pub fn sample_schema() -> Schema {
    Schema::new()
        .field("pkg", FieldSpec::list(MergePolicy::Append))
        .field("user", FieldSpec::scalar().overridable())
        .field("groups", FieldSpec::set())
        .field("services", FieldSpec::map())
        .field(
            "boot",
            FieldSpec::map()
                .field("timeout", FieldSpec::scalar())
                .field("kernel", FieldSpec::scalar()),
        )
}

/// The same schema as a TOML document, for on-disk scenarios.
pub const SAMPLE_SCHEMA_TOML: &str = r#"[fields.pkg]
kind = "list"
merge = "append"

[fields.user]
kind = "scalar"
overridable = true

[fields.groups]
kind = "set"

[fields.services]
kind = "map"

[fields.boot.fields.timeout]
kind = "scalar"

[fields.boot.fields.kernel]
kind = "scalar"
"#;

/// `{pkg: [..packages], user: <user>}`
pub fn packages_and_user(packages: &[&str], user: &str) -> ConfigTree {
    ConfigTree::from_iter([
        ("pkg", Value::list(packages.iter().copied().map(Value::str))),
        ("user", Value::str(user)),
    ])
}

/// A tree touching every value shape.
pub fn rich_tree() -> ConfigTree {
    ConfigTree::from_iter([
        (
            "boot",
            Value::map([("kernel", Value::str("linux")), ("timeout", Value::int(5))]),
        ),
        ("groups", Value::set([Value::str("audio"), Value::str("wheel")])),
        ("pkg", Value::list([Value::str("git"), Value::str("vim")])),
        (
            "services",
            Value::map([
                ("nginx", Value::map([("enable", Value::bool(true))])),
                ("sshd", Value::map([("port", Value::int(22))])),
            ]),
        ),
        ("user", Value::str("alice")),
    ])
}

/// [`rich_tree`] with six divergences: `boot.timeout` and `pkg` replaced,
/// `groups` and `services.nginx` removed, `services.redis` and `shell`
/// added.
pub fn rich_tree_edited() -> ConfigTree {
    ConfigTree::from_iter([
        (
            "boot",
            Value::map([("kernel", Value::str("linux")), ("timeout", Value::int(3))]),
        ),
        ("pkg", Value::list([Value::str("git"), Value::str("tmux")])),
        (
            "services",
            Value::map([
                ("redis", Value::map([("enable", Value::bool(true))])),
                ("sshd", Value::map([("port", Value::int(22))])),
            ]),
        ),
        ("shell", Value::str("zsh")),
        ("user", Value::str("alice")),
    ])
}
