use histsys::{
    Channel, Recentering, SystKind, SystRegistry, Symmetrization, Systematic, Template,
    TemplateKey, TemplateStore, Variation,
};

fn template(name: &str, contents: Vec<f64>) -> Template {
    Template::uniform(name, "m(lv)", 0.0, 300.0, contents).unwrap()
}

fn seed_input_store() -> TemplateStore {
    let mut store = TemplateStore::new();
    for (process, contents) in [
        ("ttbar", vec![10.0, 20.0, 10.0]),
        ("wjets", vec![40.0, 30.0, 20.0]),
        ("singletop", vec![5.0, 8.0, 5.0]),
    ] {
        store.insert(
            &TemplateKey::nominal("pretag", "mlv", process),
            template(process, contents),
        );
    }
    // one-sided JES variation, missing for singletop on purpose
    store.insert(
        &TemplateKey::source("pretag", "mlv", "ttbar", "jes"),
        template("ttbar_jes", vec![12.0, 18.0, 11.0]),
    );
    store.insert(
        &TemplateKey::source("pretag", "mlv", "wjets", "jes"),
        template("wjets_jes", vec![44.0, 28.0, 18.0]),
    );
    // pre-shaped JER pair for ttbar
    store.insert(
        &TemplateKey::variation("pretag", "mlv", "ttbar", "jer", Variation::Up),
        template("ttbar_jer_up", vec![11.0, 21.0, 10.5]),
    );
    store.insert(
        &TemplateKey::variation("pretag", "mlv", "ttbar", "jer", Variation::Down),
        template("ttbar_jer_down", vec![9.0, 19.0, 9.5]),
    );
    store
}

fn channel() -> Channel {
    Channel {
        name: "el_2jet".to_string(),
        discriminant: "mlv".to_string(),
        base_dir: ".".to_string(),
        samples: vec![
            "ttbar".to_string(),
            "wjets".to_string(),
            "singletop".to_string(),
        ],
        systematics: vec![
            Systematic::new(
                "jes",
                "Jet energy scale",
                SystKind::OneSided {
                    symmetrization: Symmetrization::FullDifference,
                },
            ),
            Systematic::new(
                "jer",
                "Jet energy resolution",
                SystKind::Pair {
                    recentering: Recentering::None,
                },
            ),
        ],
    }
}

#[test]
fn registry_per_systematic_end_to_end() {
    let store = seed_input_store();
    let channel = channel();
    let mut output = TemplateStore::new();

    for systematic in &channel.systematics {
        let mut registry = SystRegistry::new(systematic.clone());
        registry.initialize(&store, "pretag", &channel).unwrap();
        registry.save_templates(&mut output);
        registry.clear();
        assert!(registry.is_empty());
    }

    // jes: both processes with sources are combined, singletop is skipped
    let jes_up = output
        .get(&TemplateKey::variation(
            "pretag",
            "mlv",
            "ttbar",
            "jes",
            Variation::Up,
        ))
        .unwrap();
    assert_eq!(jes_up.contents(), &[12.0, 18.0, 11.0]);
    let jes_down = output
        .get(&TemplateKey::variation(
            "pretag",
            "mlv",
            "ttbar",
            "jes",
            Variation::Down,
        ))
        .unwrap();
    assert_eq!(jes_down.contents(), &[8.0, 22.0, 9.0]);
    assert!(output
        .get(&TemplateKey::variation(
            "pretag",
            "mlv",
            "singletop",
            "jes",
            Variation::Up,
        ))
        .is_none());

    // jer: the pre-shaped pair passes through unchanged
    let jer_up = output
        .get(&TemplateKey::variation(
            "pretag",
            "mlv",
            "ttbar",
            "jer",
            Variation::Up,
        ))
        .unwrap();
    assert_eq!(jer_up.contents(), &[11.0, 21.0, 10.5]);
}

#[test]
fn artifact_round_trip_through_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let base_dir = dir.path().to_str().unwrap().to_string();
    // the explicit base_dir wins over the channel's recorded one
    let channel = channel();
    assert_ne!(channel.base_dir, base_dir);

    seed_input_store()
        .write(&channel.artifact_path_in(&base_dir))
        .unwrap();

    let mut registry = SystRegistry::new(channel.systematics[0].clone());
    registry
        .initialize_from_dir(&base_dir, "pretag", &channel)
        .unwrap();
    assert_eq!(registry.len(), 2);

    let mut output = TemplateStore::new();
    registry.save_templates(&mut output);
    let out_path = format!("{}/el_2jet.syst.json", base_dir);
    output.write(&out_path).unwrap();

    let reloaded = TemplateStore::open(&out_path).unwrap();
    assert_eq!(reloaded.len(), 4);
    for (key, template) in reloaded.iter() {
        assert!(key.ends_with("High") || key.ends_with("Low"));
        assert_eq!(template.bins(), 3);
    }
}
