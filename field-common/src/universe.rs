use crate::attractor::{Attractor, AttractorField};
use crate::emitter::{Emitter, EmitterField};
use crate::error::{EditError, HashError};
use crate::expression::Scope;
use crate::hash_codec::{decode_uri, encode_uri};
use crate::particle::Particle;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which collection an item lives in. Emitter and attractor names are
/// separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Emitter,
    Attractor,
}

impl ItemKind {
    fn root_name(self) -> &'static str {
        match self {
            ItemKind::Emitter => "Emitter",
            ItemKind::Attractor => "Attractor",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            ItemKind::Emitter => "emitter",
            ItemKind::Attractor => "attractor",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// An emitter or an attractor.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Emitter(Emitter),
    Attractor(Attractor),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Emitter(_) => ItemKind::Emitter,
            Item::Attractor(_) => ItemKind::Attractor,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Item::Emitter(e) => &e.name,
            Item::Attractor(a) => &a.name,
        }
    }
}

/// Selected item names, all from one collection. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    kind: ItemKind,
    names: Vec<String>,
}

impl Selection {
    fn single(kind: ItemKind, name: &str) -> Self {
        Selection {
            kind,
            names: vec![name.to_string()],
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn contains(&self, kind: ItemKind, name: &str) -> bool {
        self.kind == kind && self.names.iter().any(|n| n == name)
    }
}

trait Named: Clone {
    fn name(&self) -> &str;
}

impl Named for Emitter {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Attractor {
    fn name(&self) -> &str {
        &self.name
    }
}

fn index_by_name<T: Named>(items: &[T], name: &str) -> Option<usize> {
    items.iter().position(|item| item.name() == name)
}

/// `"<root> #<n>"` for the lowest `n` not yet taken.
fn unique_name<T: Named>(items: &[T], root: &str) -> String {
    (0..)
        .map(|n| format!("{} #{}", root, n))
        .find(|candidate| index_by_name(items, candidate).is_none())
        .unwrap_or_else(|| root.to_string())
}

/// Replaces same-named entries in place and appends the rest.
fn overrides_by_name<T: Named>(items: &[T], overrides: Vec<T>) -> Vec<T> {
    let mut result = items.to_vec();
    for replacement in overrides {
        match index_by_name(&result, replacement.name()) {
            Some(i) => result[i] = replacement,
            None => result.push(replacement),
        }
    }
    result
}

/// Wire shape of the configuration string.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashEnvelope {
    #[serde(default)]
    selected_items: Option<Vec<String>>,
    #[serde(default)]
    controls_hidden: Option<bool>,
    emitters: Vec<String>,
    attractors: Vec<String>,
}

/// The complete state of the field apart from the live particles.
///
/// Every operation returns a new `Universe`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    emitters: Vec<Emitter>,
    attractors: Vec<Attractor>,
    selection: Option<Selection>,
    controls_hidden: bool,
}

impl Universe {
    /// The field shown on startup: two facing emitters either side of an
    /// oscillating attractor, evaluated at tick 0.
    pub fn initial<R: Rng + ?Sized>(rng: &mut R) -> Universe {
        let emitter = |name: &str, x: &str, angle: &str| {
            [
                (EmitterField::X, x),
                (EmitterField::Y, "250"),
                (EmitterField::Spread, "pi / 4"),
                (EmitterField::Angle, angle),
                (EmitterField::EmissionRate, "t % 20 == 0"),
                (EmitterField::BatchSize, "1"),
                (EmitterField::LifeSpan, "500"),
                (EmitterField::Hue, "abs(sin(t / 50)) + 1"),
            ]
            .into_iter()
            .fold(Emitter::new(name), |e, (field, expr)| e.change(field, expr))
        };

        Universe {
            emitters: vec![
                emitter("Emitter #0", "50", "0"),
                emitter("Emitter #1", "450", "pi"),
            ],
            attractors: vec![Attractor::with_expressions(
                "Attractor #0",
                "Attractor #0",
                "250",
                "250",
                "sin(t / 50) * 20",
            )],
            selection: None,
            controls_hidden: false,
        }
        .update(0, rng)
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn attractors(&self) -> &[Attractor] {
        &self.attractors
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Selected names in selection order; empty when nothing is selected.
    pub fn selected_names(&self) -> &[String] {
        self.selection.as_ref().map_or(&[], |s| s.names())
    }

    pub fn controls_hidden(&self) -> bool {
        self.controls_hidden
    }

    pub fn toggle_controls(&self) -> Universe {
        Universe {
            controls_hidden: !self.controls_hidden,
            ..self.clone()
        }
    }

    /// Re-evaluates every item for `tick`. `R` is drawn once and shared;
    /// `r` is drawn per item, emitters first.
    pub fn update<R: Rng + ?Sized>(&self, tick: u64, rng: &mut R) -> Universe {
        let shared = Scope::shared(tick, rng.random());

        let n = self.emitters.len();
        let emitters = self
            .emitters
            .iter()
            .enumerate()
            .map(|(j, e)| e.update(&shared.for_item(j, n, rng.random())))
            .collect();

        let n = self.attractors.len();
        let attractors = self
            .attractors
            .iter()
            .enumerate()
            .map(|(j, a)| a.update(&shared.for_item(j, n, rng.random())))
            .collect();

        Universe {
            emitters,
            attractors,
            ..self.clone()
        }
    }

    /// Lets every emitter that has not yet emitted at its current tick do so.
    pub fn emit(&self, target: &mut Vec<Particle>) -> Universe {
        Universe {
            emitters: self.emitters.iter().map(|e| e.emit(target)).collect(),
            ..self.clone()
        }
    }

    pub fn add_emitter<R: Rng + ?Sized>(&self, tick: u64, rng: &mut R) -> Universe {
        let name = unique_name(&self.emitters, ItemKind::Emitter.root_name());
        let n = self.emitters.len();
        let scope = Scope::shared(tick, rng.random()).for_item(n, n + 1, rng.random());
        let item = Emitter::new(&name).update(&scope);
        debug!("Adding {}", name);

        let mut emitters = self.emitters.clone();
        emitters.push(item);
        Universe {
            emitters,
            selection: Some(Selection::single(ItemKind::Emitter, &name)),
            ..self.clone()
        }
    }

    pub fn add_attractor<R: Rng + ?Sized>(&self, tick: u64, rng: &mut R) -> Universe {
        let name = unique_name(&self.attractors, ItemKind::Attractor.root_name());
        let n = self.attractors.len();
        let scope = Scope::shared(tick, rng.random()).for_item(n, n + 1, rng.random());
        let item =
            Attractor::with_expressions(&name, &name, "250", "50", "sin(t / 50) * 20").update(&scope);
        debug!("Adding {}", name);

        let mut attractors = self.attractors.clone();
        attractors.push(item);
        Universe {
            attractors,
            selection: Some(Selection::single(ItemKind::Attractor, &name)),
            ..self.clone()
        }
    }

    fn contains(&self, kind: ItemKind, name: &str) -> bool {
        match kind {
            ItemKind::Emitter => index_by_name(&self.emitters, name).is_some(),
            ItemKind::Attractor => index_by_name(&self.attractors, name).is_some(),
        }
    }

    /// Applies a click on an item.
    ///
    /// A plain click selects just the item, or deselects it if it was the
    /// only selected one. A multi-select click toggles the item, except that
    /// adding an item of the other kind restarts the selection from it.
    pub fn select(&self, kind: ItemKind, name: &str, is_multi: bool) -> Universe {
        if !self.contains(kind, name) {
            debug!("Ignoring selection of unknown {} '{}'", kind, name);
            return self.clone();
        }

        let already = self
            .selection
            .as_ref()
            .is_some_and(|s| s.contains(kind, name));

        let selection = match (&self.selection, is_multi) {
            (Some(current), false) if already => {
                if current.names.len() > 1 {
                    Some(Selection::single(kind, name))
                } else {
                    None
                }
            }
            (_, false) => Some(Selection::single(kind, name)),
            (Some(current), true) if already => {
                let names: Vec<String> = current.names.iter().filter(|n| *n != name).cloned().collect();
                (!names.is_empty()).then_some(Selection { kind, names })
            }
            (Some(current), true) if current.kind == kind => {
                let mut names = current.names.clone();
                names.push(name.to_string());
                Some(Selection { kind, names })
            }
            (_, true) => Some(Selection::single(kind, name)),
        };

        Universe {
            selection,
            ..self.clone()
        }
    }

    /// Replaces the selection outright, dropping names that do not exist.
    pub fn with_selection(&self, kind: ItemKind, names: &[String]) -> Universe {
        let mut kept: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if self.contains(kind, name) && !kept.contains(name) {
                kept.push(name.clone());
            }
        }
        Universe {
            selection: (!kept.is_empty()).then_some(Selection { kind, names: kept }),
            ..self.clone()
        }
    }

    pub fn clear_selection(&self) -> Universe {
        Universe {
            selection: None,
            ..self.clone()
        }
    }

    /// Replaces same-named items in the collection of `items[0]`, keeping
    /// their order. Unknown names are appended. Items of the other kind are
    /// ignored. Callers re-run [`Universe::update`] afterwards.
    pub fn change_items(&self, items: Vec<Item>) -> Universe {
        let Some(kind) = items.first().map(Item::kind) else {
            return self.clone();
        };

        match kind {
            ItemKind::Emitter => {
                let overrides = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Item::Emitter(e) => Some(e),
                        Item::Attractor(a) => {
                            warn!("Ignoring attractor '{}' in an emitter edit", a.name);
                            None
                        }
                    })
                    .collect();
                Universe {
                    emitters: overrides_by_name(&self.emitters, overrides),
                    ..self.clone()
                }
            }
            ItemKind::Attractor => {
                let overrides = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Item::Attractor(a) => Some(a),
                        Item::Emitter(e) => {
                            warn!("Ignoring emitter '{}' in an attractor edit", e.name);
                            None
                        }
                    })
                    .collect();
                Universe {
                    attractors: overrides_by_name(&self.attractors, overrides),
                    ..self.clone()
                }
            }
        }
    }

    pub fn item(&self, kind: ItemKind, name: &str) -> Option<Item> {
        match kind {
            ItemKind::Emitter => {
                index_by_name(&self.emitters, name).map(|i| Item::Emitter(self.emitters[i].clone()))
            }
            ItemKind::Attractor => {
                index_by_name(&self.attractors, name).map(|i| Item::Attractor(self.attractors[i].clone()))
            }
        }
    }

    /// Applies one editor request. `field` is a field name such as
    /// `"emissionRate"`, or `"label"` to rename the item's label. Expressions
    /// are validated before they are accepted, and no text may contain the
    /// `_` field separator.
    pub fn change_field(
        &self,
        kind: ItemKind,
        name: &str,
        field: &str,
        text: &str,
    ) -> Result<Universe, EditError> {
        let item = self.item(kind, name).ok_or_else(|| EditError::UnknownItem {
            kind: kind.noun(),
            name: name.to_string(),
        })?;

        let changed = match item {
            Item::Emitter(e) if field == "label" => Item::Emitter(e.try_change_label(text)?),
            Item::Attractor(a) if field == "label" => Item::Attractor(a.try_change_label(text)?),
            Item::Emitter(e) => Item::Emitter(e.try_change(field.parse()?, text)?),
            Item::Attractor(a) => Item::Attractor(a.try_change(field.parse()?, text)?),
        };
        Ok(self.change_items(vec![changed]))
    }

    /// The collection the selection belongs to, if anything is selected.
    pub fn source_of_selection(&self) -> Option<ItemKind> {
        self.selection.as_ref().map(Selection::kind)
    }

    /// The selected items, in selection order.
    pub fn selected_items(&self) -> Vec<Item> {
        let Some(selection) = &self.selection else {
            return Vec::new();
        };
        selection
            .names
            .iter()
            .filter_map(|name| self.item(selection.kind, name))
            .collect()
    }

    /// Field names the editor offers for the current selection.
    pub fn selected_fields(&self) -> Vec<&'static str> {
        match self.source_of_selection() {
            Some(ItemKind::Emitter) => EmitterField::ALL.iter().map(|f| f.as_str()).collect(),
            Some(ItemKind::Attractor) => AttractorField::ALL.iter().map(|f| f.as_str()).collect(),
            None => Vec::new(),
        }
    }

    pub fn delete_selected_items(&self) -> Universe {
        let Some(selection) = &self.selection else {
            return self.clone();
        };
        let selected = |name: &str| selection.names.iter().any(|n| n == name);

        let mut next = self.clone();
        match selection.kind {
            ItemKind::Emitter => next.emitters.retain(|e| !selected(&e.name)),
            ItemKind::Attractor => next.attractors.retain(|a| !selected(&a.name)),
        }
        next.selection = None;
        next
    }

    /// Appends a copy of every selected item under a fresh name. The
    /// selection keeps pointing at the originals.
    pub fn duplicate_selected_items(&self) -> Universe {
        let Some(selection) = &self.selection else {
            return self.clone();
        };

        let mut next = self.clone();
        for name in &selection.names {
            match selection.kind {
                ItemKind::Emitter => {
                    if let Some(i) = index_by_name(&next.emitters, name) {
                        let fresh = unique_name(&next.emitters, ItemKind::Emitter.root_name());
                        let copy = next.emitters[i].renamed(&fresh);
                        next.emitters.push(copy);
                    }
                }
                ItemKind::Attractor => {
                    if let Some(i) = index_by_name(&next.attractors, name) {
                        let fresh = unique_name(&next.attractors, ItemKind::Attractor.root_name());
                        let copy = next.attractors[i].renamed(&fresh);
                        next.attractors.push(copy);
                    }
                }
            }
        }
        next
    }

    fn step_selection(&self, forward: bool) -> Universe {
        let Some(selection) = &self.selection else {
            return self.clone();
        };
        let names: Vec<&str> = match selection.kind {
            ItemKind::Emitter => self.emitters.iter().map(|e| e.name.as_str()).collect(),
            ItemKind::Attractor => self.attractors.iter().map(|a| a.name.as_str()).collect(),
        };
        if names.is_empty() {
            return self.clear_selection();
        }

        let len = names.len();
        let next = match names.iter().position(|n| *n == selection.names[0]) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };

        Universe {
            selection: Some(Selection::single(selection.kind, names[next])),
            ..self.clone()
        }
    }

    pub fn select_next(&self) -> Universe {
        self.step_selection(true)
    }

    pub fn select_previous(&self) -> Universe {
        self.step_selection(false)
    }

    /// Rewinds every item to tick 0 without touching expressions.
    pub fn reset_time(&self) -> Universe {
        Universe {
            emitters: self.emitters.iter().map(Emitter::reset_time).collect(),
            attractors: self.attractors.iter().map(Attractor::reset_time).collect(),
            ..self.clone()
        }
    }

    fn envelope(&self) -> HashEnvelope {
        HashEnvelope {
            selected_items: Some(self.selected_names().to_vec()),
            controls_hidden: Some(self.controls_hidden),
            emitters: self.emitters.iter().map(Emitter::serialize).collect(),
            attractors: self.attractors.iter().map(Attractor::serialize).collect(),
        }
    }

    /// The unescaped JSON form of the configuration.
    pub fn to_json(&self) -> String {
        // A struct of strings, bools and string vectors always serializes.
        serde_json::to_string(&self.envelope()).unwrap_or_default()
    }

    /// The shareable `#...` configuration string.
    pub fn to_hash(&self) -> String {
        format!("#{}", encode_uri(&self.to_json()))
    }

    /// Builds a universe from the JSON form and evaluates it at tick 0.
    pub fn from_json<R: Rng + ?Sized>(json: &str, rng: &mut R) -> Result<Universe, HashError> {
        let envelope: HashEnvelope = serde_json::from_str(json)?;

        let emitters = envelope
            .emitters
            .iter()
            .map(|e| Emitter::unserialize(e))
            .collect::<Result<Vec<_>, _>>()?;
        let attractors = envelope
            .attractors
            .iter()
            .map(|a| Attractor::unserialize(a))
            .collect::<Result<Vec<_>, _>>()?;

        let universe = Universe {
            emitters,
            attractors,
            selection: None,
            controls_hidden: envelope.controls_hidden.unwrap_or(false),
        };

        // The first name decides the collection, attractors first.
        let names = envelope.selected_items.unwrap_or_default();
        let universe = match names.first() {
            Some(first) => {
                let kind = if universe.contains(ItemKind::Attractor, first) {
                    ItemKind::Attractor
                } else {
                    ItemKind::Emitter
                };
                universe.with_selection(kind, &names)
            }
            None => universe,
        };

        Ok(universe.update(0, rng))
    }

    /// Decodes a configuration string, with or without its leading `#`.
    pub fn try_from_hash<R: Rng + ?Sized>(hash: &str, rng: &mut R) -> Result<Universe, HashError> {
        let body = hash.strip_prefix('#').unwrap_or(hash);
        if body.is_empty() {
            return Err(HashError::Empty);
        }
        Universe::from_json(&decode_uri(body)?, rng)
    }

    /// Like [`Universe::try_from_hash`], falling back to
    /// [`Universe::initial`] when the string is absent or malformed.
    pub fn from_hash<R: Rng + ?Sized>(hash: &str, rng: &mut R) -> Universe {
        if hash.is_empty() {
            return Universe::initial(rng);
        }
        match Universe::try_from_hash(hash, rng) {
            Ok(universe) => universe,
            Err(e) => {
                warn!("Malformed configuration string, using the default universe: {}", e);
                Universe::initial(rng)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn names<T: Named>(items: &[T]) -> Vec<&str> {
        items.iter().map(|i| i.name()).collect()
    }

    #[test]
    fn initial_universe_shape() {
        let u = Universe::initial(&mut rng());
        assert_eq!(names(u.emitters()), ["Emitter #0", "Emitter #1"]);
        assert_eq!(names(u.attractors()), ["Attractor #0"]);
        assert!(u.selected_names().is_empty());
        assert_eq!(u.emitters()[1].value(EmitterField::X), 450.0);
        assert_eq!(u.emitters()[0].value(EmitterField::EmissionRate), 1.0);
    }

    #[test]
    fn unique_names_fill_gaps() {
        let u = Universe::default()
            .add_emitter(0, &mut rng())
            .add_emitter(0, &mut rng())
            .add_emitter(0, &mut rng());
        assert_eq!(names(u.emitters()), ["Emitter #0", "Emitter #1", "Emitter #2"]);
        assert_eq!(u.selected_names(), ["Emitter #2"]);

        let u = u.select(ItemKind::Emitter, "Emitter #1", false).delete_selected_items();
        let u = u.add_emitter(0, &mut rng());
        assert_eq!(names(u.emitters()), ["Emitter #0", "Emitter #2", "Emitter #1"]);
    }

    #[test]
    fn added_items_are_evaluated() {
        let u = Universe::default().add_attractor(50, &mut rng());
        let a = &u.attractors()[0];
        assert_eq!(a.name, "Attractor #0");
        assert_eq!(a.tick(), 50);
        assert_eq!(a.position().y, 50.0);
        assert!((a.mass() - (1.0f64).sin() * 20.0).abs() < 1e-12);
        assert_eq!(u.source_of_selection(), Some(ItemKind::Attractor));
    }

    #[test]
    fn plain_click_selection() {
        let u = Universe::initial(&mut rng());
        let u = u.select(ItemKind::Emitter, "Emitter #0", false);
        assert_eq!(u.selected_names(), ["Emitter #0"]);

        // Clicking the sole selected item clears the selection.
        assert!(u.select(ItemKind::Emitter, "Emitter #0", false).selected_names().is_empty());

        // Clicking one of several selected items narrows to it.
        let multi = u.select(ItemKind::Emitter, "Emitter #1", true);
        assert_eq!(multi.selected_names(), ["Emitter #0", "Emitter #1"]);
        let narrowed = multi.select(ItemKind::Emitter, "Emitter #1", false);
        assert_eq!(narrowed.selected_names(), ["Emitter #1"]);
    }

    #[test]
    fn multi_select_toggles_and_stays_homogeneous() {
        let u = Universe::initial(&mut rng())
            .select(ItemKind::Emitter, "Emitter #0", true)
            .select(ItemKind::Emitter, "Emitter #1", true);
        assert_eq!(u.selected_names(), ["Emitter #0", "Emitter #1"]);

        let toggled = u.select(ItemKind::Emitter, "Emitter #0", true);
        assert_eq!(toggled.selected_names(), ["Emitter #1"]);
        assert_eq!(toggled.select(ItemKind::Emitter, "Emitter #1", true).selection(), None);

        let mixed = u.select(ItemKind::Attractor, "Attractor #0", true);
        assert_eq!(mixed.selected_names(), ["Attractor #0"]);
        assert_eq!(mixed.source_of_selection(), Some(ItemKind::Attractor));
    }

    #[test]
    fn unknown_items_are_not_selected() {
        let u = Universe::initial(&mut rng());
        assert_eq!(u.select(ItemKind::Attractor, "Emitter #0", false), u);
    }

    #[test]
    fn change_items_preserves_order() {
        let u = Universe::initial(&mut rng());
        let edited = u.emitters()[0].change(EmitterField::Angle, "pi / 2");
        let fresh = Emitter::new("Emitter #9");
        let u2 = u.change_items(vec![Item::Emitter(edited), Item::Emitter(fresh)]);
        assert_eq!(names(u2.emitters()), ["Emitter #0", "Emitter #1", "Emitter #9"]);
        assert_eq!(u2.emitters()[0].field(EmitterField::Angle).expression(), "pi / 2");
        assert_eq!(u2.attractors(), u.attractors());
        assert_eq!(u.change_items(Vec::new()), u);
    }

    #[test]
    fn change_field_routes_edits() {
        let u = Universe::initial(&mut rng());
        let u2 = u
            .change_field(ItemKind::Attractor, "Attractor #0", "mass", "-30")
            .unwrap()
            .update(1, &mut rng());
        assert_eq!(u2.attractors()[0].mass(), -30.0);

        let relabeled = u.change_field(ItemKind::Emitter, "Emitter #1", "label", "Right").unwrap();
        assert_eq!(relabeled.emitters()[1].label, "Right");

        assert!(matches!(
            u.change_field(ItemKind::Emitter, "Emitter #7", "x", "1"),
            Err(EditError::UnknownItem { .. })
        ));
        assert!(matches!(
            u.change_field(ItemKind::Emitter, "Emitter #0", "mass", "1"),
            Err(EditError::UnknownField { .. })
        ));
        assert!(matches!(
            u.change_field(ItemKind::Emitter, "Emitter #0", "x", "sin("),
            Err(EditError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn edits_may_not_contain_the_field_separator() {
        let u = Universe::initial(&mut rng());
        assert!(matches!(
            u.change_field(ItemKind::Attractor, "Attractor #0", "label", "left_side"),
            Err(EditError::ReservedSeparator { field }) if field == "label"
        ));
        assert!(matches!(
            u.change_field(ItemKind::Emitter, "Emitter #0", "hue", "a_b"),
            Err(EditError::ReservedSeparator { field }) if field == "hue"
        ));
        assert_eq!(
            u.change_field(ItemKind::Emitter, "Emitter #0", "label", "Left side").unwrap().emitters()[0].label,
            "Left side"
        );
    }

    #[test]
    fn delete_only_touches_selected_collection() {
        let u = Universe::initial(&mut rng())
            .add_emitter(0, &mut rng())
            .add_attractor(0, &mut rng());
        // The attractor collection now has "Attractor #0" and "Attractor #1".
        let u = u
            .select(ItemKind::Emitter, "Emitter #0", false)
            .select(ItemKind::Emitter, "Emitter #2", true)
            .delete_selected_items();
        assert_eq!(names(u.emitters()), ["Emitter #1"]);
        assert_eq!(u.attractors().len(), 2);
        assert_eq!(u.selection(), None);
    }

    #[test]
    fn duplicates_get_distinct_names() {
        let u = Universe::initial(&mut rng())
            .select(ItemKind::Emitter, "Emitter #0", true)
            .select(ItemKind::Emitter, "Emitter #1", true)
            .duplicate_selected_items();
        assert_eq!(
            names(u.emitters()),
            ["Emitter #0", "Emitter #1", "Emitter #2", "Emitter #3"]
        );
        assert_eq!(u.emitters()[3].field(EmitterField::X).expression(), "450");
        assert_eq!(u.emitters()[3].label, "Emitter #3");
        assert_eq!(u.selected_names(), ["Emitter #0", "Emitter #1"]);
    }

    #[test]
    fn selection_cycles() {
        let u = Universe::initial(&mut rng()).select(ItemKind::Emitter, "Emitter #1", false);
        assert_eq!(u.select_next().selected_names(), ["Emitter #0"]);
        assert_eq!(u.select_previous().selected_names(), ["Emitter #0"]);
        assert_eq!(u.select_next().select_next().selected_names(), ["Emitter #1"]);

        let a = Universe::initial(&mut rng()).select(ItemKind::Attractor, "Attractor #0", false);
        assert_eq!(a.select_next().selected_names(), ["Attractor #0"]);
        assert_eq!(Universe::initial(&mut rng()).select_next().selection(), None);
    }

    #[test]
    fn selected_fields_follow_kind() {
        let u = Universe::initial(&mut rng());
        assert!(u.selected_fields().is_empty());
        let a = u.select(ItemKind::Attractor, "Attractor #0", false);
        assert_eq!(a.selected_fields(), ["x", "y", "mass"]);
        let e = u.select(ItemKind::Emitter, "Emitter #0", false);
        assert!(e.selected_fields().contains(&"emissionRate"));
        assert_eq!(e.selected_items().len(), 1);
    }

    #[test]
    fn hash_shape() {
        let u = Universe::initial(&mut rng()).select(ItemKind::Attractor, "Attractor #0", false);
        let json = u.to_json();
        assert!(json.starts_with(r#"{"selectedItems":["Attractor #0"],"controlsHidden":false,"emitters":["Emitter #0_Emitter #0_50_250_0_pi / 4_20_1_t % 20 == 0_"#));
        assert!(json.ends_with(r#""attractors":["Attractor #0_Attractor #0_250_250_sin(t / 50) * 20"]}"#));
        assert!(u.to_hash().starts_with("#%7B%22selectedItems%22:%5B%22Attractor%20#0%22%5D"));
    }

    #[test]
    fn hash_round_trip() {
        let u = Universe::initial(&mut rng())
            .add_attractor(3, &mut rng())
            .select(ItemKind::Attractor, "Attractor #0", true)
            .toggle_controls();
        let back = Universe::try_from_hash(&u.to_hash(), &mut rng()).unwrap();
        assert_eq!(back.emitters(), u.emitters());
        assert_eq!(back.attractors(), u.attractors());
        assert_eq!(back.selected_names(), ["Attractor #1", "Attractor #0"]);
        assert!(back.controls_hidden());
        assert_eq!(back.to_hash(), u.to_hash());
    }

    #[test]
    fn malformed_hash_falls_back() {
        let mut rng = rng();
        let initial = Universe::initial(&mut rng.clone());
        for hash in ["", "#", "#%7Bnot json", "#%ZZ", "#%7B%22emitters%22:%5B%22a_b%22%5D,%22attractors%22:%5B%5D%7D"] {
            let u = Universe::from_hash(hash, &mut rng);
            assert_eq!(u.emitters(), initial.emitters(), "hash {:?}", hash);
            assert_eq!(u.attractors(), initial.attractors());
        }
    }

    #[test]
    fn stale_selection_names_are_dropped() {
        let json = r#"{"selectedItems":["Attractor #0","Ghost","Attractor #0"],"emitters":[],"attractors":["Attractor #0_A_1_2_3"]}"#;
        let u = Universe::from_json(json, &mut rng()).unwrap();
        assert_eq!(u.selected_names(), ["Attractor #0"]);
        assert!(!u.controls_hidden());
        assert_eq!(u.attractors()[0].mass(), 3.0);
    }

    #[test]
    fn reset_time_rewinds_items() {
        let u = Universe::initial(&mut rng()).update(40, &mut rng());
        let mut out = Vec::new();
        let u = u.emit(&mut out);
        assert_eq!(out.len(), 2);
        let u = u.reset_time();
        assert!(u.emitters().iter().all(|e| e.tick() == 0 && e.can_emit()));
        assert!(u.attractors().iter().all(|a| a.tick() == 0));
        assert_eq!(u.emitters(), Universe::initial(&mut rng()).emitters());
    }

    #[test]
    fn random_scope_reaches_expressions() {
        let u = Universe::default()
            .add_emitter(0, &mut rng())
            .add_emitter(0, &mut rng())
            .change_field(ItemKind::Emitter, "Emitter #0", "x", "r")
            .unwrap()
            .change_field(ItemKind::Emitter, "Emitter #1", "x", "r")
            .unwrap()
            .change_field(ItemKind::Emitter, "Emitter #0", "y", "R")
            .unwrap()
            .change_field(ItemKind::Emitter, "Emitter #1", "y", "R")
            .unwrap()
            .update(1, &mut rng());
        let [a, b] = [&u.emitters()[0], &u.emitters()[1]];
        assert_eq!(a.value(EmitterField::Y), b.value(EmitterField::Y));
        assert_ne!(a.value(EmitterField::X), b.value(EmitterField::X));
        assert!((0.0..1.0).contains(&a.value(EmitterField::X)));
    }
}
