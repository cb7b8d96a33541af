//! End-to-end pack/unpack scenarios over both backends.

use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::tempdir;
use vttpack::prelude::*;
use vttpack::store::SortedStore;

fn write_json(dir: &Path, name: &str, doc: &Value) {
    let mut text = serde_json::to_string_pretty(doc).unwrap();
    text.push('\n');
    fs::write(dir.join(name), text).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn hero_actor() -> Value {
    json!({
        "_key": "!actors!aaa",
        "_id": "aaa",
        "name": "Hero",
        "items": [{"_id": "i1", "_key": "!actors.items!aaa.i1", "name": "Sword", "effects": []}],
        "effects": []
    })
}

#[test]
fn sorted_compile_flattens_embedded_documents() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "actor1.json", &hero_actor());

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();

    let mut store = SortedStore::open(&pack, false).unwrap();
    let entries = store.entries().unwrap();
    let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["!actors!aaa", "!actors.items!aaa.i1"]);

    let actor = &entries[0].1;
    assert_eq!(actor["items"], json!(["i1"]));
    assert_eq!(actor["effects"], json!([]));
    assert!(actor.get("_key").is_none());
    assert!(entries[1].1.get("_key").is_none());
    assert_eq!(entries[1].1["name"], "Sword");
}

#[test]
fn sorted_extract_roundtrips_the_source() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "actor1.json", &hero_actor());

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();
    extract_pack(&pack, &out, &ExtractOptions::new()).unwrap();

    let files: Vec<_> = fs::read_dir(&out).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(read_json(&out.join("Hero_aaa.json")), hero_actor());
}

#[test]
fn recompiling_an_extraction_reproduces_the_pack() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    let pack2 = dir.path().join("pack2");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "actor1.json", &hero_actor());
    write_json(
        &src,
        "scene1.json",
        &json!({
            "_key": "!scenes!s1",
            "_id": "s1",
            "name": "Cave",
            "tokens": [{
                "_id": "t1", "_key": "!scenes.tokens!s1.t1",
                "delta": {"_id": "d1", "_key": "!scenes.tokens.delta!s1.t1.d1", "items": [], "effects": []}
            }]
        }),
    );

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();
    extract_pack(&pack, &out, &ExtractOptions::new()).unwrap();
    compile_pack(&out, &pack2, &CompileOptions::new()).unwrap();

    let mut first = SortedStore::open(&pack, false).unwrap();
    let mut second = SortedStore::open(&pack2, false).unwrap();
    assert_eq!(first.entries().unwrap(), second.entries().unwrap());
}

#[test]
fn duplicate_keys_cancel_the_compile() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "actor1.json", &hero_actor());
    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();

    let dupes = dir.path().join("dupes");
    fs::create_dir_all(&dupes).unwrap();
    write_json(&dupes, "a.json", &json!({"_key": "!actors!aaa", "_id": "aaa", "name": "One"}));
    write_json(&dupes, "b.json", &json!({"_key": "!actors!aaa", "_id": "aaa", "name": "Two"}));

    let err = compile_pack(&dupes, &pack, &CompileOptions::new()).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { ref key } if key == "!actors!aaa"));

    // The failed compile wrote nothing
    let mut store = SortedStore::open(&pack, false).unwrap();
    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].1["name"], "Hero");
}

#[test]
fn folders_mode_projects_a_directory_tree() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    write_json(
        &src,
        "folder.json",
        &json!({"_key": "!folders!f1", "_id": "f1", "name": "Bestiary", "folder": null}),
    );
    write_json(
        &src,
        "actor.json",
        &json!({"_key": "!actors!aaa", "_id": "aaa", "folder": "f1", "name": "Hero"}),
    );

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();
    extract_pack(&pack, &out, &ExtractOptions::new().with_folders(true)).unwrap();

    assert!(out.join("Bestiary_f1/_Folder.json").is_file());
    assert!(out.join("Bestiary_f1/Hero_aaa.json").is_file());
    assert_eq!(read_json(&out.join("Bestiary_f1/Hero_aaa.json"))["name"], "Hero");
}

#[test]
fn adventures_expand_into_sibling_files() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    write_json(
        &src,
        "adventure.json",
        &json!({
            "_key": "!adventures!adv1",
            "_id": "adv1",
            "name": "Intro",
            "items": [{"_id": "i1", "name": "Sword"}]
        }),
    );

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();
    extract_pack(
        &pack,
        &out,
        &ExtractOptions::new().with_expand_adventures(true),
    )
    .unwrap();

    let adventure = read_json(&out.join("Intro_adv1.json"));
    assert_eq!(adventure["items"], json!(["Sword_i1.json"]));
    let item = read_json(&out.join("Sword_i1.json"));
    assert_eq!(item["name"], "Sword");
    assert_eq!(item["_id"], "i1");
}

#[test]
fn expanded_adventures_compile_back_to_one_entry() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    let pack2 = dir.path().join("pack2");
    fs::create_dir_all(&src).unwrap();
    write_json(
        &src,
        "adventure.json",
        &json!({
            "_key": "!adventures!adv1",
            "_id": "adv1",
            "name": "Intro",
            "items": [{"_id": "i1", "name": "Sword"}]
        }),
    );

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();
    extract_pack(
        &pack,
        &out,
        &ExtractOptions::new().with_expand_adventures(true),
    )
    .unwrap();
    compile_pack(&out, &pack2, &CompileOptions::new()).unwrap();

    let mut store = SortedStore::open(&pack2, false).unwrap();
    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "!adventures!adv1");
    assert_eq!(entries[0].1["items"][0]["name"], "Sword");
    assert!(entries[0].1["items"][0].get("_key").is_none());
}

#[test]
fn omit_volatile_keeps_files_byte_identical() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    let mut actor = hero_actor();
    actor["_stats"] = json!({"modifiedTime": 100, "coreVersion": "12"});
    write_json(&src, "actor1.json", &actor);

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();
    extract_pack(&pack, &out, &ExtractOptions::new()).unwrap();
    let before = fs::read(out.join("Hero_aaa.json")).unwrap();

    // Same content, different volatile metadata
    let pack2 = dir.path().join("pack2");
    actor["_stats"]["modifiedTime"] = json!(999);
    write_json(&src, "actor1.json", &actor);
    compile_pack(&src, &pack2, &CompileOptions::new()).unwrap();
    extract_pack(&pack2, &out, &ExtractOptions::new().with_omit_volatile(true)).unwrap();

    let after = fs::read(out.join("Hero_aaa.json")).unwrap();
    assert_eq!(before, after);

    // Without the gate the new metadata lands on disk
    extract_pack(&pack2, &out, &ExtractOptions::new()).unwrap();
    let replaced = read_json(&out.join("Hero_aaa.json"));
    assert_eq!(replaced["_stats"]["modifiedTime"], 999);
}

#[test]
fn clean_removes_stale_files_and_plain_extract_keeps_them() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&out).unwrap();
    write_json(&src, "actor1.json", &hero_actor());
    fs::write(out.join("unrelated.json"), "{}\n").unwrap();

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();

    extract_pack(&pack, &out, &ExtractOptions::new()).unwrap();
    assert!(out.join("unrelated.json").is_file());
    assert!(out.join("Hero_aaa.json").is_file());

    extract_pack(&pack, &out, &ExtractOptions::new().with_clean(true)).unwrap();
    assert!(!out.join("unrelated.json").exists());
    assert!(out.join("Hero_aaa.json").is_file());
}

#[test]
fn failed_extraction_leaves_dest_untouched() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("precious.json"), "{}\n").unwrap();

    // An actor whose item reference has no embedded entry
    {
        let mut store = SortedStore::open(&pack, true).unwrap();
        let mut batch = vttpack::store::Batch::new();
        batch
            .put("!actors!aaa", &json!({"_id": "aaa", "name": "Hero", "items": ["ghost"], "effects": []}))
            .unwrap();
        store.write(batch).unwrap();
        store.close().unwrap();
    }

    let err = extract_pack(&pack, &out, &ExtractOptions::new().with_clean(true)).unwrap_err();
    assert!(matches!(err, Error::MissingEmbedded { .. }));
    assert!(out.join("precious.json").is_file());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
}

#[test]
fn log_store_roundtrip_keeps_embedded_inline() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("actors.db");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "actor1.json", &hero_actor());
    write_json(
        &src,
        "folder.json",
        &json!({"_key": "!folders!f1", "_id": "f1", "name": "Bestiary"}),
    );

    compile_pack(&src, &pack, &CompileOptions::new().with_nedb(true)).unwrap();

    // One line per document, folders silently skipped, keys stripped
    let raw = fs::read_to_string(&pack).unwrap();
    assert_eq!(raw.lines().count(), 1);
    assert!(!raw.contains("_key"));
    assert!(raw.contains("Sword"));

    extract_pack(
        &pack,
        &out,
        &ExtractOptions::new()
            .with_nedb(true)
            .with_document_type("Actor"),
    )
    .unwrap();
    assert_eq!(read_json(&out.join("Hero_aaa.json")), hero_actor());
}

#[test]
fn log_store_targets_require_a_db_extension() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();

    let err = compile_pack(
        &src,
        &dir.path().join("pack.leveldb"),
        &CompileOptions::new().with_nedb(true),
    )
    .unwrap_err();
    assert!(matches!(err, Error::BadTarget { .. }));

    let err = extract_pack(
        &dir.path().join("pack"),
        &dir.path().join("out"),
        &ExtractOptions::new().with_nedb(true),
    )
    .unwrap_err();
    assert!(matches!(err, Error::BadTarget { .. }));
}

#[test]
fn log_store_extraction_requires_a_collection() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.db");
    fs::write(&pack, "").unwrap();

    let err = extract_pack(&pack, &dir.path().join("out"), &ExtractOptions::new().with_nedb(true))
        .unwrap_err();
    assert!(matches!(err, Error::MissingType));

    let err = extract_pack(
        &pack,
        &dir.path().join("out"),
        &ExtractOptions::new()
            .with_nedb(true)
            .with_document_type("NoSuchType"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnknownDocumentType { .. }));
}

#[test]
fn yaml_sources_roundtrip() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("actor.yml"),
        "_key: '!actors!aaa'\n_id: aaa\nname: Hero\nitems: []\neffects: []\n",
    )
    .unwrap();

    compile_pack(&src, &pack, &CompileOptions::new().with_yaml(true)).unwrap();
    extract_pack(&pack, &out, &ExtractOptions::new().with_yaml(true)).unwrap();

    let text = fs::read_to_string(out.join("Hero_aaa.yml")).unwrap();
    let doc: Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(doc["name"], "Hero");
    assert_eq!(doc["_key"], "!actors!aaa");
}

#[test]
fn entries_without_keys_are_skipped() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "keyed.json", &hero_actor());
    write_json(&src, "keyless.json", &json!({"_id": "zzz", "name": "Ghost"}));

    compile_pack(&src, &pack, &CompileOptions::new()).unwrap();

    let mut store = SortedStore::open(&pack, false).unwrap();
    let keys: Vec<String> = store.keys().unwrap();
    assert!(keys.iter().all(|k| !k.contains("zzz")));
}

#[test]
fn transform_entry_can_drop_and_mutate() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let pack = dir.path().join("pack");
    fs::create_dir_all(&src).unwrap();
    write_json(&src, "actor1.json", &hero_actor());
    write_json(
        &src,
        "actor2.json",
        &json!({"_key": "!actors!bbb", "_id": "bbb", "name": "Villain"}),
    );

    let transform = |doc: &mut Value| -> Result<bool> {
        if doc["_id"] == "bbb" {
            return Ok(false);
        }
        doc["tag"] = json!("seen");
        Ok(true)
    };
    compile_pack(
        &src,
        &pack,
        &CompileOptions::new().with_transform_entry(&transform),
    )
    .unwrap();

    let mut store = SortedStore::open(&pack, false).unwrap();
    let entries = store.entries().unwrap();
    assert!(entries.iter().all(|(k, _)| !k.contains("bbb")));
    assert_eq!(entries[0].1["tag"], "seen");
}
