//! Exercises the concrete read/write scenarios the path-addressed editor
//! must satisfy, plus the cross-cutting invariants that hold for any
//! well-formed key against any handle.

use pretty_assertions::assert_eq;
use xmltree_core::{Errno, XmlDocument, XmlTreeError};

#[test]
fn simple_leaf_read_and_unknown_key() {
    let doc = XmlDocument::new(b"<a>b</a>");
    assert_eq!(doc.get("a").unwrap(), "b");
    assert!(matches!(doc.get("aa"), Err(XmlTreeError::NotFound)));
}

#[test]
fn append_child_leaves_parent_untouched_then_rejects_duplicate() {
    let mut doc = XmlDocument::new(b"<a>b</a>");
    doc.append("a.x", Some("foo")).unwrap();
    assert_eq!(doc.get("a.x").unwrap(), "foo");
    assert_eq!(doc.get("a").unwrap(), "b");
    assert!(matches!(doc.append("a", Some("z")), Err(XmlTreeError::AlreadyExists)));
}

#[test]
fn entities_are_decoded_on_read() {
    let src = b"<config><version>1</version><system><motd>Ben&amp;Jerry's &lt; Oak &gt;</motd></system></config>";
    let doc = XmlDocument::new(src);
    assert_eq!(doc.get("config.system.motd").unwrap(), "Ben&Jerry's < Oak >");
}

#[test]
fn indexed_siblings_total_last_and_out_of_range() {
    let src = b"<top><dogs><dog><name>Fido</name></dog><dog><name>Spot</name></dog><total>2</total></dogs></top>";
    let mut doc = XmlDocument::new(src);

    assert_eq!(doc.get("top.dog[1].name").unwrap(), "Fido");
    assert_eq!(doc.get("top.dog[#]").unwrap(), "2");
    assert_eq!(doc.get("top.dog[$].name").unwrap(), "Spot");
    assert!(matches!(doc.get("top.dog[0].name"), Err(XmlTreeError::MalformedKey(_))));
    assert!(matches!(doc.get("top.dog[3].name"), Err(XmlTreeError::NotFound)));
    assert!(matches!(doc.update("top.dog[#]", "9"), Err(XmlTreeError::Forbidden)));

    doc.delete("top.dog[$]").unwrap();
    assert_eq!(doc.get("top.dog[#]").unwrap(), "1");
}

#[test]
fn unchanged_document_round_trips_byte_for_byte() {
    let src = b"<?xml?>\n<top>\n  <foo>123</foo>\n</top>\n";
    let doc = XmlDocument::new(src);
    assert_eq!(doc.to_vec(), src.to_vec());
}

#[test]
fn cat_list_build_up_produces_two_blocks_and_total() {
    let src = b"<top><foo>123</foo></top>";
    let mut doc = XmlDocument::new(src);

    doc.append("top.cat[+].name", Some("Meow")).unwrap();
    doc.set("top.cat[$].colour", Some("white")).unwrap();
    doc.append("top.cat[+].name", Some("Kitty")).unwrap();
    doc.set("top.cat[$].colour", Some("pink")).unwrap();
    doc.delete("top.foo").unwrap();

    let out = String::from_utf8(doc.to_vec()).unwrap();
    assert_eq!(out.matches("<cat>").count(), 2);
    assert!(out.contains("<total>2</total>"));
    assert!(out.contains("<name>Meow</name>"));
    assert!(out.contains("<colour>white</colour>"));
    assert!(out.contains("<name>Kitty</name>"));
    assert!(out.contains("<colour>pink</colour>"));
    assert!(!out.contains("<foo>"));
}

#[test]
fn cdata_is_preserved_verbatim() {
    let src = b"<top><cat><tag><![CDATA[ <foo> ]]></tag></cat></top>";
    let doc = XmlDocument::new(src);
    assert_eq!(doc.get("top.cat[1].tag").unwrap(), " <foo> ");
    assert_eq!(doc.to_vec(), src.to_vec());
}

#[test]
fn exists_agrees_with_get() {
    let doc = XmlDocument::new(b"<a><b>1</b></a>");
    assert_eq!(doc.exists("a.b"), doc.get("a.b").is_ok());
    assert_eq!(doc.exists("a.c"), doc.get("a.c").is_ok());
}

#[test]
fn append_then_get_round_trips_the_value() {
    let mut doc = XmlDocument::new(b"<a></a>");
    doc.append("a.b", Some("hello")).unwrap();
    assert_eq!(doc.get("a.b").unwrap(), "hello");
}

#[test]
fn update_then_get_round_trips_the_value() {
    let mut doc = XmlDocument::new(b"<a><b>old</b></a>");
    doc.update("a.b", "new").unwrap();
    assert_eq!(doc.get("a.b").unwrap(), "new");
}

#[test]
fn delete_is_idempotent() {
    let mut doc = XmlDocument::new(b"<a><b>1</b></a>");
    doc.delete("a.b").unwrap();
    assert!(!doc.exists("a.b"));
    doc.delete("a.b").unwrap();
}

#[test]
fn missing_list_total_reads_as_zero() {
    let doc = XmlDocument::new(b"<top></top>");
    assert_eq!(doc.get("top.dog[#]").unwrap(), "0");
}

#[test]
fn append_bumps_total_and_last_sentinel() {
    let mut doc = XmlDocument::new(b"<top></top>");
    doc.append("top.dog[+].name", Some("Rex")).unwrap();
    assert_eq!(doc.get("top.dog[#]").unwrap(), "1");
    assert_eq!(doc.get("top.dog[$].name").unwrap(), "Rex");
    doc.append("top.dog[+].name", Some("Fido")).unwrap();
    assert_eq!(doc.get("top.dog[#]").unwrap(), "2");
    assert_eq!(doc.get("top.dog[$].name").unwrap(), "Fido");
}

#[test]
fn set_dispatches_to_append_update_and_delete() {
    let mut doc = XmlDocument::new(b"<a></a>");
    doc.set("a.b", Some("v1")).unwrap();
    assert_eq!(doc.get("a.b").unwrap(), "v1");
    doc.set("a.b", Some("v2")).unwrap();
    assert_eq!(doc.get("a.b").unwrap(), "v2");
    doc.set("a.b", None).unwrap();
    assert!(!doc.exists("a.b"));
}

#[test]
fn errno_mapping_matches_the_documented_taxonomy() {
    assert_eq!(XmlTreeError::NotFound.errno(), Errno::NoEnt);
    assert_eq!(XmlTreeError::MalformedKey("x".into()).errno(), Errno::Inval);
    assert_eq!(XmlTreeError::KeyTooLong.errno(), Errno::NoMem);
    assert_eq!(XmlTreeError::AlreadyExists.errno(), Errno::Exist);
    assert_eq!(XmlTreeError::Forbidden.errno(), Errno::Perm);
}

#[test]
fn last_sentinel_on_drained_list_is_not_found_not_the_first_survivor() {
    let src = b"<top><dogs><dog><name>Fido</name></dog><total>1</total></dogs></top>";
    let mut doc = XmlDocument::new(src);
    doc.delete("top.dog[$]").unwrap();
    assert_eq!(doc.get("top.dog[#]").unwrap(), "0");
    // The only `<dog>` is gone from the logical view; `[$]` must resolve to
    // the unmatchable index-0 sentinel, not silently fall back to the
    // first literal `<dog>` still sitting in the source bytes.
    assert!(matches!(doc.get("top.dog[$].name"), Err(XmlTreeError::NotFound)));
}

#[test]
fn whole_list_delete_removes_the_container_not_its_parent() {
    let src = b"<top><dogs><dog><name>Fido</name></dog><dog><name>Spot</name></dog><total>2</total></dogs><foo>1</foo></top>";
    let mut doc = XmlDocument::new(src);
    doc.delete("top.dog[*]").unwrap();
    assert!(!doc.exists("top.dog[1]"));
    assert!(!doc.exists("top.dog[#]") || doc.get("top.dog[#]").unwrap() == "0");
    // the sibling outside the list must survive the whole-list delete
    assert_eq!(doc.get("top.foo").unwrap(), "1");
    let out = String::from_utf8(doc.to_vec()).unwrap();
    assert!(!out.contains("<dogs>"));
    assert!(out.contains("<foo>1</foo>"));
}

#[test]
fn whole_list_subscript_rejected_outside_delete() {
    let mut doc = XmlDocument::new(b"<top><dogs><dog><name>Fido</name></dog><total>1</total></dogs></top>");
    assert!(matches!(doc.get("top.dog[*]"), Err(XmlTreeError::MalformedKey(_))));
    assert!(!doc.exists("top.dog[*]"));
    assert!(matches!(doc.update("top.dog[*]", "x"), Err(XmlTreeError::MalformedKey(_))));
    assert!(matches!(doc.append("top.dog[*]", Some("x")), Err(XmlTreeError::MalformedKey(_))));
}

#[test]
fn total_subscript_rejects_non_terminal_and_update() {
    let doc = XmlDocument::new(b"<top><dogs><dog><name>Fido</name></dog><total>1</total></dogs></top>");
    assert!(matches!(
        doc.get("top.dog[#].name"),
        Err(XmlTreeError::MalformedKey(_))
    ));
}

#[test]
fn deleting_last_on_an_absent_list_is_a_true_no_op() {
    let src = b"<top><foo>1</foo></top>";
    let mut doc = XmlDocument::new(src);
    doc.delete("top.unicorn[$]").unwrap();
    // No `<unicorns>` container, and in particular no spurious
    // `<total>0</total>`, should have been materialized by the delete.
    assert_eq!(doc.to_vec(), src.to_vec());
    assert!(!doc.exists("top.unicorn[1]"));
}

#[test]
fn keys_lists_every_element_in_emission_order() {
    let src = b"<top><dogs><dog><name>Fido</name></dog><total>1</total></dogs></top>";
    let doc = XmlDocument::new(src);
    let keys = doc.keys();
    assert!(keys.contains(&"top.dog1.name".to_string()));
    assert!(keys.contains(&"top.dogs.total".to_string()) || keys.contains(&"top.dog[#]".to_string()));
}
