//! End-to-end pipeline runs over offline page snapshots.
//!
//! The snapshot session stands in for the browser: the login form, the
//! cycle banner, the catalog shortcut, and chunked card reveals all live
//! in one HTML document, so the whole flow from sign-in to page files can
//! be exercised without a driver.

use chrono::Datelike;
use revenda_scraper_lib::application::ExtractionPipeline;
use revenda_scraper_lib::infrastructure::config::{
    Credentials, PacingConfig, ScraperConfig, portal,
};
use revenda_scraper_lib::infrastructure::load_more::LoadEnd;
use revenda_scraper_lib::infrastructure::profile::SiteProfile;
use revenda_scraper_lib::infrastructure::snapshot::SnapshotSession;

fn card(sku: &str, name: &str) -> String {
    format!(
        r#"<div data-flora="card">
          <a href="/produto/{sku}"><img src="https://res.boticario.com/{sku}.webp" alt="{name}"></a>
          <span data-custom="true"><p>{sku}</p></span>
          <div class="flora--c-ieqJkR"><p>{name}</p></div>
          <div data-pague="true">
            <p class="flora--c-PJLV-gxwRVS">R$ 164,90</p>
            <p class="flora--c-PJLV-gvAhgR">R$ 118,52</p>
          </div>
          <div data-available="true"><p>Disponível</p></div>
        </div>"#
    )
}

fn portal_home() -> String {
    format!(
        r#"<html><body>
          <form>
            <input id="username" name="username" />
            <input id="password" name="password" type="password" />
            <button type="submit"><p>Entrar</p></button>
          </form>
          <small class="css-2mmsys">Ciclo 16: 03/11 a 30/11</small>
          <a href="/catalogo"><p>Ver tudo</p></a>
          {card_one}
          {card_two}
          <button data-flora="button"><p>Ver mais produtos</p></button>
        </body></html>"#,
        card_one = card("78365", "Malbec Tradicional 100ml"),
        card_two = card("55110", "Kit Presente Egeo Dolce"),
    )
}

fn instant_pacing() -> PacingConfig {
    PacingConfig {
        page_settle_seconds: 0,
        post_trigger_settle_seconds: 0,
        stall_recheck_seconds: 0,
        scroll_settle_seconds: 0,
        card_pause_ms: 0,
        card_jitter_ms: 0,
        login_settle_seconds: 0,
        login_recheck_seconds: 0,
        step_pause_seconds: 0,
        field_pause_seconds: 0,
        catalog_settle_seconds: 0,
        max_load_triggers: 100,
    }
}

fn test_credentials() -> Credentials {
    Credentials {
        username: "12345678900".to_string(),
        password: "s3nh4-forte".to_string(),
    }
}

#[tokio::test]
async fn test_full_run_from_sign_in_to_page_files() {
    let output = tempfile::tempdir().expect("tempdir");
    let year = chrono::Utc::now().year();

    // Reveals land one per trigger: submit, "Ver tudo", then one load-more
    // trigger. The third reveal empties the queue, after which the
    // load-more control disappears and the listing is converged.
    let session = SnapshotSession::from_html(&portal_home())
        .with_url(portal::LOGIN_URL)
        .with_post_trigger_url(portal::BASE_URL)
        .with_chunks(vec![
            card("78365", "Malbec Tradicional 100ml"),
            card("90210", "Egeo Dolce 90ml"),
            card("44556", "Cuide-se Bem Nuvem 400ml"),
        ])
        .exhaust_affordance("Ver mais produtos");

    let profile = SiteProfile::default();
    let mut config = ScraperConfig::default();
    config.pacing = instant_pacing();
    config.output.directory = output.path().join("produtos");

    let report = ExtractionPipeline::new(&session, &profile, &config)
        .run(Some(&test_credentials()))
        .await
        .expect("run should succeed");

    assert!(report.session_error.is_none());
    assert!(report.catalog_opened);
    assert_eq!(session.filled_values(), vec![
        "12345678900".to_string(),
        "s3nh4-forte".to_string()
    ]);

    // Five cards on the converged page, one a repeat by SKU.
    assert_eq!(report.cards_found, 5);
    assert_eq!(report.accepted, 4);
    assert_eq!(report.duplicates, 1);

    let load = report.load.expect("portal profile loads incrementally");
    assert_eq!(load.triggers_fired, 1);
    assert_eq!(load.final_count, 5);
    assert_eq!(load.end, LoadEnd::AffordanceMissing);

    let cycle = report.cycle.expect("banner is on the page");
    assert_eq!(cycle.number.as_deref(), Some("16"));

    let cycle_raw = std::fs::read_to_string(config.output.directory.join("ciclo_periodo.json"))
        .expect("cycle file is written first");
    let cycle_json: serde_json::Value = serde_json::from_str(&cycle_raw).unwrap();
    assert_eq!(cycle_json["numero_ciclo"], "16");
    assert_eq!(cycle_json["data_inicio"], format!("{year}-11-03"));

    let page_raw =
        std::fs::read_to_string(config.output.directory.join("produtos_001_004.json"))
            .expect("one page file for four products");
    let page_json: serde_json::Value = serde_json::from_str(&page_raw).unwrap();
    assert_eq!(page_json["marca_id"], 1);
    assert_eq!(page_json["ciclo_info"]["numero"], format!("16/{year}"));
    assert_eq!(page_json["ciclo_info"]["nome"], format!("Ciclo 16 {year}"));
    let produtos = page_json["produtos"].as_array().unwrap();
    assert_eq!(produtos.len(), 4);
    assert_eq!(produtos[0]["sku"], "78365");
    assert_eq!(produtos[1]["sku"], "55110");
    assert_eq!(produtos[2]["sku"], "90210");
    assert_eq!(produtos[3]["sku"], "44556");
}

#[tokio::test]
async fn test_run_without_banner_or_growth_uses_the_fallback_cycle() {
    let output = tempfile::tempdir().expect("tempdir");
    let year = chrono::Utc::now().year();

    let html = format!(
        r#"<html><body>
          {card_one}
          {card_two}
          <button data-flora="button"><p>Ver mais produtos</p></button>
        </body></html>"#,
        card_one = card("78365", "Malbec Tradicional 100ml"),
        card_two = card("55110", "Kit Presente Egeo Dolce"),
    );
    let session = SnapshotSession::from_html(&html);

    // Already inside the listing: no login, no catalog shortcut, no banner.
    let profile = SiteProfile {
        login: None,
        catalog_entry: None,
        cycle_banner: None,
        ..SiteProfile::default()
    };
    let mut config = ScraperConfig::default();
    config.pacing = instant_pacing();
    config.output.directory = output.path().join("produtos");

    let report = ExtractionPipeline::new(&session, &profile, &config)
        .run(None)
        .await
        .expect("run should succeed");

    assert!(!report.catalog_opened);
    assert!(report.cycle.is_none());
    assert_eq!(report.accepted, 2);

    // The persistent control never grows the listing, so the run converges
    // through the stall recheck.
    let load = report.load.expect("load-more control is configured");
    assert_eq!(load.end, LoadEnd::GrowthStalled);
    assert_eq!(load.final_count, 2);

    assert!(!config.output.directory.join("ciclo_periodo.json").exists());

    let page_raw =
        std::fs::read_to_string(config.output.directory.join("produtos_001_002.json"))
            .expect("single page file");
    let page_json: serde_json::Value = serde_json::from_str(&page_raw).unwrap();
    assert_eq!(page_json["ciclo_info"]["numero"], format!("01/{year}"));
    assert_eq!(page_json["ciclo_info"]["nome"], format!("Ciclo {year}"));
    assert_eq!(page_json["produtos"].as_array().unwrap().len(), 2);
}
