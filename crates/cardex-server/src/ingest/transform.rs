//! Record normalization and the digital-content filter

use cardex_common::types::{parse_release_date, CatalogRecord, ExclusionRules, PriceUpdate};

use super::models::{Admission, DatedPrices, RawCatalogCard, RawPriceRecord, RawProviderPrices};

/// Normalize one catalog card and decide whether it belongs in the physical catalog
///
/// Records without a natural identifier cannot be keyed and are skipped.
pub fn transform_card(
    raw: &RawCatalogCard,
    rules: &ExclusionRules,
    language: &str,
) -> Admission<CatalogRecord> {
    let card = &raw.card;
    let set = &raw.set;

    let uuid = match card.uuid.as_deref().map(str::trim) {
        Some(uuid) if !uuid.is_empty() => uuid.to_string(),
        _ => return Admission::Skip,
    };
    let name = card.name.clone().unwrap_or_default();
    let is_online_only = card.is_online_only.unwrap_or(false) || set.is_online_only;

    if rules.is_excluded(&name, &set.name, is_online_only) {
        return Admission::Exclude;
    }

    let localized_name = card
        .foreign_data
        .iter()
        .find(|fd| fd.language.as_deref() == Some(language))
        .and_then(|fd| fd.name.clone());

    let release_date = card
        .original_release_date
        .as_deref()
        .or(set.release_date.as_deref())
        .and_then(|date| parse_release_date(date).ok());

    Admission::Accept(CatalogRecord {
        uuid,
        name,
        localized_name,
        set_code: set.code.clone(),
        set_name: set.name.clone(),
        rarity: card.rarity.clone().unwrap_or_default(),
        colors: card.colors.clone().unwrap_or_default(),
        mana_cost: card.mana_cost.clone(),
        mana_value: card.mana_value.unwrap_or(0.0),
        type_line: card.type_line.clone().unwrap_or_default(),
        text: card.text.clone(),
        scryfall_id: card.identifiers.scryfall_id.clone(),
        collector_number: card.number.clone().unwrap_or_default(),
        is_online_only,
        release_date,
        price_usd: None,
        price_usd_foil: None,
        price_eur: None,
        price_eur_foil: None,
    })
}

/// Reduce one identifier's price blob to its latest paper retail prices
pub fn transform_price(raw: RawPriceRecord) -> Admission<PriceUpdate> {
    let paper = raw.formats.paper.unwrap_or_default();
    let (usd, usd_foil) = latest_retail(paper.tcgplayer.as_ref());
    let (eur, eur_foil) = latest_retail(paper.cardmarket.as_ref());

    let update = PriceUpdate {
        uuid: raw.uuid,
        usd,
        usd_foil,
        eur,
        eur_foil,
    };

    if update.has_any() {
        Admission::Accept(update)
    } else {
        Admission::Skip
    }
}

fn latest_retail(provider: Option<&RawProviderPrices>) -> (Option<f64>, Option<f64>) {
    let Some(retail) = provider.and_then(|p| p.retail.as_ref()) else {
        return (None, None);
    };
    (latest(retail.normal.as_ref()), latest(retail.foil.as_ref()))
}

/// Value under the lexicographically last date key
fn latest(points: Option<&DatedPrices>) -> Option<f64> {
    points?.iter().next_back().map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::models::{
        RawCard, RawForeignData, RawPaperPrices, RawPriceFormats, RawRetail, SetInfo,
    };
    use std::sync::Arc;

    fn set(name: &str, online_only: bool) -> Arc<SetInfo> {
        Arc::new(SetInfo {
            code: "TST".to_string(),
            name: name.to_string(),
            release_date: Some("2024-02-09".to_string()),
            is_online_only: online_only,
        })
    }

    fn card(name: &str) -> RawCard {
        RawCard {
            uuid: Some(format!("uuid-{}", name)),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn admit(set: Arc<SetInfo>, card: RawCard) -> Admission<CatalogRecord> {
        transform_card(
            &RawCatalogCard { set, card },
            &ExclusionRules::default(),
            "Japanese",
        )
    }

    #[test]
    fn test_required_fields_default() {
        let Admission::Accept(record) = admit(set("Test Set", false), card("Test Bolt")) else {
            panic!("expected an accepted record");
        };

        assert_eq!(record.uuid, "uuid-Test Bolt");
        assert_eq!(record.rarity, "");
        assert!(record.colors.is_empty());
        assert_eq!(record.mana_value, 0.0);
        assert_eq!(record.mana_cost, None);
        assert_eq!(record.text, None);
        assert_eq!(record.localized_name, None);
        assert_eq!(record.set_code, "TST");
        assert_eq!(
            record.release_date,
            Some(chrono::NaiveDate::from_ymd_opt(2024, 2, 9).unwrap())
        );
    }

    #[test]
    fn test_localized_name_uses_target_language() {
        let mut raw = card("Test Bolt");
        raw.foreign_data = vec![
            RawForeignData {
                language: Some("German".to_string()),
                name: Some("Testblitz".to_string()),
            },
            RawForeignData {
                language: Some("Japanese".to_string()),
                name: Some("テストボルト".to_string()),
            },
        ];

        let Admission::Accept(record) = admit(set("Test Set", false), raw) else {
            panic!("expected an accepted record");
        };
        assert_eq!(record.localized_name.as_deref(), Some("テストボルト"));
    }

    #[test]
    fn test_card_release_date_wins_over_set() {
        let mut raw = card("Test Bolt");
        raw.original_release_date = Some("2023-11-17".to_string());

        let Admission::Accept(record) = admit(set("Test Set", false), raw) else {
            panic!("expected an accepted record");
        };
        assert_eq!(
            record.release_date,
            Some(chrono::NaiveDate::from_ymd_opt(2023, 11, 17).unwrap())
        );
    }

    #[test]
    fn test_digital_content_is_excluded() {
        let mut online = card("Test Ghost");
        online.is_online_only = Some(true);

        assert_eq!(admit(set("Test Set", false), online), Admission::Exclude);
        assert_eq!(admit(set("Test Set", true), card("Test Bolt")), Admission::Exclude);
        assert_eq!(admit(set("Alchemy: Eldraine", false), card("Test Bolt")), Admission::Exclude);
        assert_eq!(admit(set("Test Set", false), card("A-Test Bolt")), Admission::Exclude);
    }

    #[test]
    fn test_missing_uuid_is_skipped() {
        let mut raw = card("Test Bolt");
        raw.uuid = None;
        assert_eq!(admit(set("Test Set", false), raw), Admission::Skip);
    }

    fn dated(points: &[(&str, f64)]) -> Option<DatedPrices> {
        Some(points.iter().map(|(d, v)| (d.to_string(), *v)).collect())
    }

    #[test]
    fn test_price_takes_latest_date() {
        let raw = RawPriceRecord {
            uuid: "u-1".to_string(),
            formats: RawPriceFormats {
                paper: Some(RawPaperPrices {
                    tcgplayer: Some(RawProviderPrices {
                        retail: Some(RawRetail {
                            normal: dated(&[("2026-10-14", 0.20), ("2026-10-15", 0.25), ("2026-09-30", 0.90)]),
                            foil: None,
                        }),
                    }),
                    cardmarket: Some(RawProviderPrices {
                        retail: Some(RawRetail {
                            normal: None,
                            foil: dated(&[("2026-10-15", 1.10)]),
                        }),
                    }),
                }),
            },
        };

        let Admission::Accept(update) = transform_price(raw) else {
            panic!("expected an accepted update");
        };
        assert_eq!(update.usd, Some(0.25));
        assert_eq!(update.usd_foil, None);
        assert_eq!(update.eur, None);
        assert_eq!(update.eur_foil, Some(1.10));
    }

    #[test]
    fn test_price_without_values_is_skipped() {
        let raw = RawPriceRecord {
            uuid: "u-1".to_string(),
            formats: RawPriceFormats {
                paper: Some(RawPaperPrices {
                    tcgplayer: Some(RawProviderPrices {
                        retail: Some(RawRetail {
                            normal: dated(&[]),
                            foil: None,
                        }),
                    }),
                    cardmarket: None,
                }),
            },
        };
        assert_eq!(transform_price(raw), Admission::Skip);

        let digital_only = RawPriceRecord {
            uuid: "u-2".to_string(),
            formats: RawPriceFormats::default(),
        };
        assert_eq!(transform_price(digital_only), Admission::Skip);
    }
}
