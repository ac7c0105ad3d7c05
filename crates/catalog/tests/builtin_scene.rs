//! Built-in models driven by the engine through the catalog.

use framesim_catalog::Catalog;
use framesim_runtime::scene::{ModelDecl, ModelTypeDecl, SubscriberDecl, TopicDecl};
use framesim_runtime::{Engine, EngineSettings, Error, SceneDecl, Value};

fn type_decl(name: &str, path: &str, movable: bool) -> ModelTypeDecl {
    ModelTypeDecl {
        name: name.into(),
        path: path.into(),
        output_movable: movable,
    }
}

fn model(model_type: &str, id: u64, init: &[(&str, Value)]) -> ModelDecl {
    ModelDecl {
        model_type: model_type.into(),
        id,
        side_id: 1,
        init: init
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}

fn renames(pairs: &[&str]) -> Vec<(String, String)> {
    pairs.iter().map(|p| (p.to_string(), p.to_string())).collect()
}

fn scene() -> SceneDecl {
    SceneDecl {
        model_types: vec![
            type_decl("mover", "builtin:mover", true),
            type_decl("spawner", "spawner", false),
            type_decl("observer", "observer", false),
        ],
        models: vec![
            model("mover", 1, &[("speed", Value::F64(10.0))]),
            model(
                "spawner",
                2,
                &[("interval", Value::I64(2)), ("limit", Value::I64(3))],
            ),
            model("observer", 3, &[]),
        ],
        topics: vec![TopicDecl {
            from: "mover".into(),
            members: vec!["longitude".into(), "latitude".into()],
            subscribers: vec![
                SubscriberDecl {
                    to: "root".into(),
                    renames: renames(&["ID", "ForceSideID", "longitude", "latitude", "State"]),
                },
                SubscriberDecl {
                    to: "observer".into(),
                    renames: renames(&["ID"]),
                },
            ],
        }],
    }
}

#[test]
fn test_movers_spawn_and_publish() {
    let mut engine = Engine::new(EngineSettings::default()).unwrap();
    engine.load(&scene(), &Catalog).unwrap();
    engine.run(8).unwrap();

    // Requests in ticks 2, 4 and 6 are materialized in frames 3, 5 and 7.
    assert_eq!(engine.model_count(), (3, 3));

    let root = engine.topic_records("root");
    assert_eq!(root.len(), 4);
    let ids: Vec<u64> = root.iter().map(|r| r["ID"].extract().unwrap()).collect();
    assert!(ids.contains(&1));
    assert!(ids.contains(&2001));
    assert!(ids.contains(&2003));

    let first = root
        .iter()
        .find(|r| r["ID"] == Value::U64(1))
        .unwrap();
    // 7 ticks of 100 ms at 10 deg/s before the 8th output.
    let lon: f64 = first["longitude"].extract().unwrap();
    assert!((lon - 7.0).abs() < 1e-9, "{lon}");
    assert_eq!(first["State"], Value::from("moving"));
}

#[test]
fn test_unknown_builtin_is_a_load_error() {
    let mut decl = scene();
    decl.model_types[0].path = "builtin:teleporter".into();
    let mut engine = Engine::new(EngineSettings::default()).unwrap();
    match engine.load(&decl, &Catalog) {
        Err(Error::PluginLoad { model_type, reason }) => {
            assert_eq!(model_type, "mover");
            assert!(reason.contains("teleporter"));
        }
        other => panic!("unexpected: {:?}", other.err()),
    }
}

#[test]
fn test_missing_identity_in_init_fails_load() {
    let mut decl = scene();
    decl.models[0]
        .init
        .insert("ID".into(), Value::String("one".into()));
    let mut engine = Engine::new(EngineSettings::default()).unwrap();
    let err = engine.load(&decl, &Catalog).unwrap_err();
    assert!(matches!(err, Error::ModelInit { id: 1, .. }));
}
