use abtest::{EngineConfig, ExperimentValue, Properties, ResolveOptions, UserIdentity};

pub fn main() {
    env_logger::init();

    let server_url = std::env::var("ABTEST_SERVER_URL").unwrap();
    let engine = EngineConfig::new(
        server_url,
        |distinct_id: &str, is_login_id: bool, event: &str, properties: &Properties| {
            println!("{event} for {distinct_id} (login: {is_login_id}): {properties:?}");
        },
    )
    .to_engine()
    .unwrap();

    let identity = UserIdentity::new("test-subject", false);

    // Resolve a variable. The first call goes to the server, the second is served from the cache
    // and does not emit a second trigger event.
    for _ in 0..2 {
        let result = engine.resolve(
            &identity,
            "button_color",
            ExperimentValue::from("grey"),
            &ResolveOptions::default(),
        );
        println!(
            "Value: {:?} (experiment {:?}, group {:?})",
            result.value, result.experiment_id, result.group_id
        );
    }
}
