//! Extracts series and card drafts from card list pages

#![allow(clippy::uninlined_format_args)]

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

use super::config::ListingSelectors;
use super::error::{ParsingError, ParsingResult};
use crate::domain::card::{normalize_colors, CardDraft, LEADER};
use crate::domain::language::Language;
use crate::domain::reconciliation::{assign_version_indices, parse_stat};
use crate::domain::series::{parse_series_option, SeriesDraft};

static HIT_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*件\s*HIT").expect("static regex"));
static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("static regex"));

/// Parser for one language's card list markup
pub struct ListingParser {
    language: Language,
    base_url: Url,
    series_option: Vec<Selector>,
    card_container: Vec<Selector>,
    info_spans: Vec<Selector>,
    name: Vec<Selector>,
    image: Vec<Selector>,
    cost: Vec<Selector>,
    power: Vec<Selector>,
    counter: Vec<Selector>,
    color: Vec<Selector>,
    block: Vec<Selector>,
    traits: Vec<Selector>,
    effect: Vec<Selector>,
    trigger: Vec<Selector>,
    source_info: Vec<Selector>,
    attribute_image: Vec<Selector>,
    field_heading: Option<Selector>,
    illustration_type: Vec<Selector>,
    modal_id_attribute: String,
    hit_count: Vec<Selector>,
}

impl ListingParser {
    /// Compile the configured selectors. `base_url` resolves relative image
    /// paths and is normally the card list page URL.
    pub fn new(selectors: &ListingSelectors, base_url: &str, language: Language) -> ParsingResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ParsingError::UrlResolutionFailed {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let field_heading = if selectors.field_heading.trim().is_empty() {
            None
        } else {
            Some(compile_one("field_heading", &selectors.field_heading)?)
        };

        Ok(Self {
            language,
            base_url,
            series_option: compile("series_option", &selectors.series_option)?,
            card_container: compile("card_container", &selectors.card_container)?,
            info_spans: compile("info_spans", &selectors.info_spans)?,
            name: compile("name", &selectors.name)?,
            image: compile_optional("image", &selectors.image),
            cost: compile_optional("cost", &selectors.cost),
            power: compile_optional("power", &selectors.power),
            counter: compile_optional("counter", &selectors.counter),
            color: compile_optional("color", &selectors.color),
            block: compile_optional("block", &selectors.block),
            traits: compile_optional("traits", &selectors.traits),
            effect: compile_optional("effect", &selectors.effect),
            trigger: compile_optional("trigger", &selectors.trigger),
            source_info: compile_optional("source_info", &selectors.source_info),
            attribute_image: compile_optional("attribute_image", &selectors.attribute_image),
            field_heading,
            illustration_type: compile_optional("illustration_type", &selectors.illustration_type),
            modal_id_attribute: selectors.modal_id_attribute.clone(),
            hit_count: compile_optional("hit_count", &selectors.hit_count),
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Series offered by the series picker, in page order
    pub fn parse_series_list(&self, html: &str) -> ParsingResult<Vec<SeriesDraft>> {
        let document = Html::parse_document(html);
        let options: Vec<ElementRef> = self
            .series_option
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        if options.is_empty() {
            return Err(ParsingError::NoSeriesFound {
                tried_selectors: self.series_option.iter().map(|s| format!("{:?}", s)).collect(),
            });
        }

        let drafts: Vec<SeriesDraft> = options
            .iter()
            .filter_map(|option| {
                let value = option.value().attr("value").unwrap_or_default();
                let label = option.text().collect::<String>();
                parse_series_option(value, &label, self.language)
            })
            .collect();

        debug!("Parsed {} series from {} options", drafts.len(), options.len());
        Ok(drafts)
    }

    /// Every card print on a series page, in page order, with version
    /// indices assigned to repeated card numbers
    pub fn parse_cards(&self, html: &str) -> Vec<CardDraft> {
        let document = Html::parse_document(html);
        let mut cards: Vec<CardDraft> = self
            .containers(&document)
            .into_iter()
            .filter_map(|container| match self.parse_card(container) {
                Ok(card) => Some(card),
                Err(e) => {
                    warn!("Skipping card entry: {}", e);
                    None
                }
            })
            .collect();

        assign_version_indices(&mut cards);
        debug!("Parsed {} card entries", cards.len());
        cards
    }

    /// Illustration kind per official modal id (`OP01-001`, `OP01-001_p1`, ...)
    pub fn parse_illustration_types(&self, html: &str) -> HashMap<String, String> {
        let document = Html::parse_document(html);
        let mut kinds = HashMap::new();
        for container in self.containers(&document) {
            let Some(id) = container.value().attr(&self.modal_id_attribute) else {
                continue;
            };
            if let Some(kind) = self.field_text(container, &self.illustration_type) {
                kinds.entry(id.trim().to_string()).or_insert(kind);
            }
        }
        kinds
    }

    /// Result count the page reports for the current series, if shown
    pub fn parse_hit_count(&self, html: &str) -> Option<i64> {
        let document = Html::parse_document(html);
        for selector in &self.hit_count {
            if let Some(element) = document.select(selector).next() {
                let text = element.text().collect::<String>();
                if let Some(count) = FIRST_NUMBER.captures(&text).and_then(|c| c[1].parse().ok()) {
                    return Some(count);
                }
            }
        }

        let body = document.root_element().text().collect::<String>();
        HIT_TEXT.captures(&body).and_then(|c| c[1].parse().ok())
    }

    fn containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.card_container
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    fn parse_card(&self, container: ElementRef) -> ParsingResult<CardDraft> {
        let info: Vec<String> = first_matching(container, &self.info_spans)
            .map(|sel| {
                container
                    .select(sel)
                    .map(|span| span.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let card_number = info.first().cloned().unwrap_or_default();
        if card_number.is_empty() {
            return Err(ParsingError::required_field_missing("card_number", "card entry"));
        }

        let card_type = info.get(2).cloned().unwrap_or_default();
        let cost = self.field_text(container, &self.cost);
        let colors = self
            .field_text(container, &self.color)
            .map(|c| normalize_colors(&c))
            .unwrap_or_default();

        Ok(CardDraft {
            name: select_text(container, &self.name).unwrap_or_default(),
            rarity: info.get(1).cloned().unwrap_or_default(),
            colors,
            cost: cost.as_deref().and_then(parse_stat),
            life: if card_type == LEADER {
                cost.as_deref().and_then(parse_stat)
            } else {
                None
            },
            power: self.field_text(container, &self.power).as_deref().and_then(parse_stat),
            counter: self.field_text(container, &self.counter).as_deref().and_then(parse_stat),
            attribute: self.attribute(container),
            traits: self.field_text(container, &self.traits),
            effect_text: self.field_text(container, &self.effect),
            trigger_text: self.field_text(container, &self.trigger),
            source_info: self.field_text(container, &self.source_info),
            block_icon: self.field_text(container, &self.block).as_deref().and_then(parse_stat),
            image_url: self.image_url(container),
            card_type,
            card_number,
            version_index: 0,
        })
    }

    /// Text of a labelled field with its heading removed; `-` reads as empty.
    fn field_text(&self, container: ElementRef, selectors: &[Selector]) -> Option<String> {
        let element = select_first(container, selectors)?;
        let mut text = element.text().collect::<String>();
        if let Some(heading) = self.field_heading.as_ref().and_then(|h| element.select(h).next()) {
            let label = heading.text().collect::<String>();
            if !label.is_empty() {
                text = text.replacen(&label, "", 1);
            }
        }
        let text = text.trim();
        if text.is_empty() || text == "-" {
            None
        } else {
            Some(text.to_string())
        }
    }

    fn attribute(&self, container: ElementRef) -> Option<String> {
        select_first(container, &self.attribute_image)
            .and_then(|img| img.value().attr("alt"))
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(ToString::to_string)
    }

    fn image_url(&self, container: ElementRef) -> Option<String> {
        let img = select_first(container, &self.image)?;
        let raw = img
            .value()
            .attr("data-src")
            .or_else(|| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())?;

        match self.base_url.join(raw) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                warn!("Could not resolve image URL {}: {}", raw, e);
                None
            }
        }
    }
}

fn compile_one(field: &str, selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// At least one selector of a required field must compile
fn compile(field: &str, selectors: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut compiled = Vec::new();
    let mut last_error = None;
    for selector in selectors {
        match compile_one(field, selector) {
            Ok(sel) => compiled.push(sel),
            Err(e) => {
                warn!("{}", e);
                last_error = Some(e);
            }
        }
    }

    if compiled.is_empty() {
        return Err(last_error.unwrap_or_else(|| ParsingError::InvalidSelector {
            field: field.to_string(),
            selector: String::new(),
            reason: "no selector configured".to_string(),
        }));
    }
    Ok(compiled)
}

fn compile_optional(field: &str, selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|selector| match compile_one(field, selector) {
            Ok(sel) => Some(sel),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect()
}

fn first_matching<'s>(element: ElementRef, selectors: &'s [Selector]) -> Option<&'s Selector> {
    selectors.iter().find(|sel| element.select(sel).next().is_some())
}

fn select_first<'a>(element: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| element.select(sel).next())
}

fn select_text(element: ElementRef, selectors: &[Selector]) -> Option<String> {
    select_first(element, selectors)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::SeriesType;

    const BASE: &str = "https://cards.example.test/cardlist/";

    const SERIES_PAGE: &str = r#"
        <html><body>
        <select class="selectModal" name="series">
          <option value="">ALL</option>
          <option value="550101">ブースターパック ROMANCE DAWN【OP-01】</option>
          <option value="550001">スタートデッキ 麦わらの一味【ST-01】</option>
          <option value="550901">プロモーションカード</option>
        </select>
        </body></html>
    "#;

    const CARD_PAGE: &str = r#"
        <html><body>
        <div class="resultCol">
          <div class="resultHead"><span>3件HIT</span></div>
          <dl class="modalCol" id="OP01-001">
            <dt><div class="infoCol"><span>OP01-001</span><span>L</span><span>LEADER</span></div>
                <div class="cardName">ロロノア・ゾロ</div></dt>
            <dd>
              <div class="frontCol"><img data-src="../images/cardlist/card/OP01-001.png?240101" src="dummy.gif"></div>
              <div class="cost"><h3>ライフ</h3>5</div>
              <div class="attribute"><h3>属性</h3><img alt="斬"></div>
              <div class="power"><h3>パワー</h3>5000</div>
              <div class="counter"><h3>カウンター</h3>-</div>
              <div class="color"><h3>色</h3>赤</div>
              <div class="block"><h3>ブロック</h3>1</div>
              <div class="feature"><h3>特徴</h3>超新星/麦わらの一味</div>
              <div class="text"><h3>テキスト</h3>【ドン!!×1】【相手のターン中】自分のキャラすべてのパワー+1000。</div>
              <div class="getInfo"><h3>入手情報</h3>ブースターパック ROMANCE DAWN【OP-01】</div>
              <div class="illustType">オリジナル</div>
            </dd>
          </dl>
          <dl class="modalCol" id="OP01-001_p1">
            <dt><div class="infoCol"><span>OP01-001</span><span>L</span><span>LEADER</span></div>
                <div class="cardName">ロロノア・ゾロ</div></dt>
            <dd>
              <div class="frontCol"><img src="https://cdn.example.test/OP01-001_p1.png"></div>
              <div class="cost"><h3>ライフ</h3>5</div>
              <div class="color"><h3>色</h3>赤</div>
              <div class="illustType">アニメ</div>
            </dd>
          </dl>
          <dl class="modalCol" id="ST01-012">
            <dt><div class="infoCol"><span>ST01-012</span><span>C</span><span>CHARACTER</span></div>
                <div class="cardName">モンキー・D・ルフィ</div></dt>
            <dd>
              <div class="cost"><h3>コスト</h3>5</div>
              <div class="power"><h3>パワー</h3>6000</div>
              <div class="counter"><h3>カウンター</h3>+1000</div>
              <div class="color"><h3>色</h3>赤/緑</div>
              <div class="trigger"><h3>トリガー</h3>-</div>
            </dd>
          </dl>
          <dl class="modalCol" id="broken"><dt><div class="cardName">no number</div></dt></dl>
        </div>
        </body></html>
    "#;

    fn parser(language: Language) -> ListingParser {
        ListingParser::new(&ListingSelectors::default(), BASE, language).expect("default selectors compile")
    }

    #[test]
    fn series_options_become_drafts() {
        let drafts = parser(Language::Jp).parse_series_list(SERIES_PAGE).expect("series found");
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].code, "OP-01");
        assert_eq!(drafts[0].series_type, SeriesType::Booster);
        assert_eq!(drafts[0].official_series_id.as_deref(), Some("550101"));
        assert_eq!(drafts[1].code, "ST-01");
        assert_eq!(drafts[1].series_type, SeriesType::Starter);
    }

    #[test]
    fn page_without_picker_is_an_error() {
        let err = parser(Language::Jp)
            .parse_series_list("<html><body></body></html>")
            .expect_err("no options");
        assert!(matches!(err, ParsingError::NoSeriesFound { .. }));
    }

    #[test]
    fn cards_are_extracted_in_page_order() {
        let cards = parser(Language::Jp).parse_cards(CARD_PAGE);
        assert_eq!(cards.len(), 3);

        let leader = &cards[0];
        assert_eq!(leader.card_number, "OP01-001");
        assert_eq!(leader.name, "ロロノア・ゾロ");
        assert_eq!(leader.rarity, "L");
        assert_eq!(leader.card_type, "LEADER");
        assert_eq!(leader.cost, Some(5));
        assert_eq!(leader.life, Some(5));
        assert_eq!(leader.power, Some(5000));
        assert_eq!(leader.counter, None);
        assert_eq!(leader.attribute.as_deref(), Some("斬"));
        assert_eq!(leader.colors, "赤");
        assert_eq!(leader.block_icon, Some(1));
        assert_eq!(leader.traits.as_deref(), Some("超新星/麦わらの一味"));
        assert_eq!(leader.source_info.as_deref(), Some("ブースターパック ROMANCE DAWN【OP-01】"));
        assert_eq!(
            leader.image_url.as_deref(),
            Some("https://cards.example.test/images/cardlist/card/OP01-001.png?240101")
        );
        assert_eq!(leader.version_index, 0);

        assert_eq!(cards[1].card_number, "OP01-001");
        assert_eq!(cards[1].version_index, 1);
        assert_eq!(cards[1].image_url.as_deref(), Some("https://cdn.example.test/OP01-001_p1.png"));

        let character = &cards[2];
        assert_eq!(character.life, None);
        assert_eq!(character.counter, Some(1000));
        assert_eq!(character.colors, "赤,緑");
        assert_eq!(character.trigger_text, None);
        assert_eq!(character.image_url, None);
    }

    #[test]
    fn english_colors_are_normalized() {
        let page = CARD_PAGE.replace("赤/緑", "Red/Green");
        let cards = parser(Language::En).parse_cards(&page);
        assert_eq!(cards[2].colors, "赤,緑");
    }

    #[test]
    fn illustration_types_keyed_by_modal_id() {
        let kinds = parser(Language::Jp).parse_illustration_types(CARD_PAGE);
        assert_eq!(kinds.get("OP01-001").map(String::as_str), Some("オリジナル"));
        assert_eq!(kinds.get("OP01-001_p1").map(String::as_str), Some("アニメ"));
        assert!(!kinds.contains_key("ST01-012"));
    }

    #[test]
    fn hit_count_from_header_or_body_text() {
        let p = parser(Language::Jp);
        assert_eq!(p.parse_hit_count(CARD_PAGE), Some(3));
        assert_eq!(p.parse_hit_count("<html><body><p>検索結果 154件HIT</p></body></html>"), Some(154));
        assert_eq!(p.parse_hit_count("<html><body></body></html>"), None);
    }

    #[test]
    fn invalid_required_selector_is_rejected() {
        let selectors = ListingSelectors {
            card_container: vec!["[[[".to_string()],
            ..ListingSelectors::default()
        };
        let result = ListingParser::new(&selectors, BASE, Language::Jp);
        assert!(matches!(result, Err(ParsingError::InvalidSelector { .. })));
    }
}
