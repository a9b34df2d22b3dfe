//! Scene-spanning entities and the keepers that own them.
//!
//! The [`Stage`] wires one keeper per entity category (roles, puppets,
//! costumes, props) together with usage tallies, synthetic-name forging and
//! the on-stage bookkeeping that backs the normalized diff directives.
//! Keepers own their records for the whole run; leaving the stage removes a
//! record from the bookkeeping sets, never from the registry, so history
//! lookups keep working after a role is gone.
//!
//! Nothing in this module can fail. Continuity surprises are returned to the
//! caller as outcome data ([`RoleUpdate`], [`CostumeEvent`], [`PropEvent`])
//! and turned into notes there.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasherDefault;

use bimap::BiMap;
use seahash::SeaHasher;
use serde::Serialize;

pub type NameHasher = BuildHasherDefault<SeaHasher>;

/// Reserved values meaning "explicitly no value", distinct from omission.
pub const PLACEHOLDERS: [&str; 2] = ["None", "---"];

// ------------- Attr -------------
/// Declared attribute field. `Unset` inherits the previous record,
/// `Absent` is an explicit placeholder, `Named` overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attr {
    #[default]
    Unset,
    Absent,
    Named(String),
}

impl Attr {
    pub fn parse(token: &str) -> Attr {
        let token = token.trim();
        if token.is_empty() {
            Attr::Unset
        } else if PLACEHOLDERS.contains(&token) {
            Attr::Absent
        } else {
            Attr::Named(token.to_owned())
        }
    }
    pub fn name(&self) -> Option<&str> {
        match self {
            Attr::Named(name) => Some(name),
            _ => None,
        }
    }
    pub fn is_named(&self) -> bool {
        matches!(self, Attr::Named(_))
    }
}

// ------------- Role -------------
/// A cast line as parsed, before merging with the registry.
#[derive(Debug, Clone, Default)]
pub struct RoleDecl {
    pub name: String,
    pub player: Attr,
    pub voice: Attr,
    pub hands: Attr,
    pub puppet: Attr,
    pub costume: Attr,
}

impl RoleDecl {
    pub fn bare(name: &str) -> Self {
        Self {
            name: name.trim().to_owned(),
            ..Default::default()
        }
    }
}

/// The registry record of a role. Performer fields are stored resolved:
/// player falls back to the role's own name, hands and voice fall back to
/// the player. Comparisons for continuity anomalies run against these
/// resolved values.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    name: String,
    player: String,
    hands: String,
    voice: String,
    puppet: Option<String>,
    scenes: BTreeSet<usize>,
}

impl Role {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn player(&self) -> &str {
        &self.player
    }
    pub fn hands(&self) -> &str {
        &self.hands
    }
    pub fn voice(&self) -> &str {
        &self.voice
    }
    pub fn puppet(&self) -> Option<&str> {
        self.puppet.as_deref()
    }
    pub fn scenes(&self) -> &BTreeSet<usize> {
        &self.scenes
    }
    /// Every human animating this role.
    pub fn persons(&self) -> BTreeSet<String> {
        let mut persons = BTreeSet::new();
        persons.insert(self.player.clone());
        persons.insert(self.hands.clone());
        persons.insert(self.voice.clone());
        persons
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (player {}, hands {}, voice {}, puppet {})",
            self.name,
            self.player,
            self.hands,
            self.voice,
            self.puppet.as_deref().unwrap_or("-")
        )
    }
}

/// One attribute that differed from the previous non-empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

/// Outcome of merging a cast declaration into the registry.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub created: bool,
    pub changes: Vec<FieldChange>,
    /// Puppet handover: (puppet, role it was taken from).
    pub handover: Option<(String, String)>,
}

#[derive(Debug, Default)]
pub struct RoleKeeper {
    kept: HashMap<String, Role, NameHasher>,
}

impl RoleKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    /// Merge a declaration with the previous record. Unspecified fields
    /// inherit, placeholders reset to the default chain, named fields
    /// overwrite; a named field differing from the previous value is
    /// reported as a change and the new value kept.
    pub fn keep(&mut self, decl: RoleDecl, scene: usize) -> RoleUpdate {
        let previous = self.kept.get(&decl.name);
        let created = previous.is_none();

        let player = match &decl.player {
            Attr::Named(p) => p.clone(),
            Attr::Absent => decl.name.clone(),
            Attr::Unset => previous.map_or_else(|| decl.name.clone(), |r| r.player.clone()),
        };
        let hands = match &decl.hands {
            Attr::Named(h) => h.clone(),
            Attr::Absent => player.clone(),
            Attr::Unset => previous.map_or_else(|| player.clone(), |r| r.hands.clone()),
        };
        let voice = match &decl.voice {
            Attr::Named(v) => v.clone(),
            Attr::Absent => player.clone(),
            Attr::Unset => previous.map_or_else(|| player.clone(), |r| r.voice.clone()),
        };
        let puppet = match &decl.puppet {
            Attr::Named(p) => Some(p.clone()),
            Attr::Absent => None,
            Attr::Unset => previous.and_then(|r| r.puppet.clone()),
        };

        let mut changes = Vec::new();
        if let Some(prev) = previous {
            if decl.player.is_named() && player != prev.player {
                changes.push(FieldChange { field: "player", from: prev.player.clone(), to: player.clone() });
            }
            if decl.hands.is_named() && hands != prev.hands {
                changes.push(FieldChange { field: "hands", from: prev.hands.clone(), to: hands.clone() });
            }
            if decl.voice.is_named() && voice != prev.voice {
                changes.push(FieldChange { field: "voice", from: prev.voice.clone(), to: voice.clone() });
            }
            if let (Attr::Named(new), Some(old)) = (&decl.puppet, prev.puppet.as_ref()) {
                if new != old {
                    changes.push(FieldChange { field: "puppet", from: old.clone(), to: new.clone() });
                }
            }
        }

        let mut scenes = previous.map(|r| r.scenes.clone()).unwrap_or_default();
        scenes.insert(scene);
        self.kept.insert(
            decl.name.clone(),
            Role { name: decl.name, player, hands, voice, puppet, scenes },
        );
        RoleUpdate { created, changes, handover: None }
    }
    pub fn get(&self, name: &str) -> Option<&Role> {
        self.kept.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.kept.contains_key(name)
    }
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.kept.values()
    }
    pub fn names(&self) -> Vec<&str> {
        self.kept.keys().map(String::as_str).collect()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Puppet -------------
/// Current puppet/role pairing plus the full pairing history. The pairing
/// is one-to-one at any time within a scene, hence the bidirectional map.
#[derive(Debug, Default)]
pub struct PuppetKeeper {
    pairing: BiMap<String, String>,
    history: BTreeMap<String, BTreeSet<String>>,
}

impl PuppetKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    /// Pair a puppet with the role playing it. Returns the role the puppet
    /// was taken from, when it was paired elsewhere.
    pub fn assign(&mut self, puppet: &str, role: &str) -> Option<String> {
        let taken_from = self
            .pairing
            .get_by_left(puppet)
            .filter(|r| r.as_str() != role)
            .cloned();
        self.pairing.insert(puppet.to_owned(), role.to_owned());
        self.history
            .entry(puppet.to_owned())
            .or_default()
            .insert(role.to_owned());
        taken_from
    }
    pub fn unpair_role(&mut self, role: &str) -> Option<String> {
        self.pairing.remove_by_right(role).map(|(puppet, _)| puppet)
    }
    pub fn role_of(&self, puppet: &str) -> Option<&str> {
        self.pairing.get_by_left(puppet).map(String::as_str)
    }
    pub fn puppet_of(&self, role: &str) -> Option<&str> {
        self.pairing.get_by_right(role).map(String::as_str)
    }
    pub fn known(&self, puppet: &str) -> bool {
        self.history.contains_key(puppet)
    }
    pub fn history(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.history
    }
    pub fn len(&self) -> usize {
        self.history.len()
    }
}

// ------------- Costume -------------
/// Costume transition for one role, emitted when an assignment is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostumeEvent {
    Add(String),
    Keep(String),
    Change { from: String, to: String },
    Remove(String),
}

#[derive(Debug, Default)]
pub struct Wardrobe {
    current: HashMap<String, String, NameHasher>,
    worn: BTreeMap<String, BTreeSet<String>>,
}

impl Wardrobe {
    pub fn new() -> Self {
        Self::default()
    }
    /// Apply an assignment and report the transition. `None` for a role
    /// with nothing on is no transition at all.
    pub fn assign(&mut self, role: &str, costume: Option<String>) -> Option<CostumeEvent> {
        let current = self.current.get(role).cloned();
        match (current, costume) {
            (None, None) => None,
            (None, Some(new)) => {
                self.put_on(role, &new);
                Some(CostumeEvent::Add(new))
            }
            (Some(old), None) => {
                self.current.remove(role);
                Some(CostumeEvent::Remove(old))
            }
            (Some(old), Some(new)) if old == new => Some(CostumeEvent::Keep(new)),
            (Some(old), Some(new)) => {
                self.put_on(role, &new);
                Some(CostumeEvent::Change { from: old, to: new })
            }
        }
    }
    fn put_on(&mut self, role: &str, costume: &str) {
        self.current.insert(role.to_owned(), costume.to_owned());
        self.worn
            .entry(costume.to_owned())
            .or_default()
            .insert(role.to_owned());
    }
    /// Take whatever the role has on; used when the role is dropped.
    pub fn remove(&mut self, role: &str) -> Option<String> {
        self.current.remove(role)
    }
    pub fn current(&self, role: &str) -> Option<&str> {
        self.current.get(role).map(String::as_str)
    }
    pub fn known(&self, costume: &str) -> bool {
        self.worn.contains_key(costume)
    }
    pub fn worn(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.worn
    }
    pub fn len(&self) -> usize {
        self.worn.len()
    }
}

// ------------- Prop -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PropKind {
    Hand,
    FrontRail,
    SecondRail,
    Just,
}

impl PropKind {
    pub fn parse(tag: &str) -> Option<PropKind> {
        match tag.trim().to_lowercase().as_str() {
            "hand" => Some(PropKind::Hand),
            "front" | "front rail" => Some(PropKind::FrontRail),
            "second" | "second rail" => Some(PropKind::SecondRail),
            "just" => Some(PropKind::Just),
            _ => None,
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            PropKind::Hand => "hand",
            PropKind::FrontRail => "front rail",
            PropKind::SecondRail => "second rail",
            PropKind::Just => "just",
        }
    }
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prop {
    name: String,
    kind: PropKind,
    owner: Option<String>,
    uses: u32,
    scenes: BTreeSet<usize>,
}

impl Prop {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> PropKind {
        self.kind
    }
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
    pub fn uses(&self) -> u32 {
        self.uses
    }
    pub fn scenes(&self) -> &BTreeSet<usize> {
        &self.scenes
    }
}

/// Outcome of keeping a prop reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropEvent {
    Added,
    Matched,
    /// The prop moved to a different owner; an explicit remove+add pair.
    Reassigned { from: Option<String> },
}

#[derive(Debug, Default)]
pub struct PropKeeper {
    kept: HashMap<String, Prop, NameHasher>,
}

impl PropKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    /// A referenced prop is either newly declared or matches the known
    /// record; matching increments the usage count, never re-creates.
    pub fn keep(&mut self, name: &str, kind: PropKind, owner: Option<&str>, scene: usize) -> PropEvent {
        match self.kept.get_mut(name) {
            None => {
                let mut scenes = BTreeSet::new();
                scenes.insert(scene);
                self.kept.insert(
                    name.to_owned(),
                    Prop {
                        name: name.to_owned(),
                        kind,
                        owner: owner.map(str::to_owned),
                        uses: 1,
                        scenes,
                    },
                );
                PropEvent::Added
            }
            Some(prop) => {
                prop.uses += 1;
                prop.scenes.insert(scene);
                match owner {
                    Some(new) if prop.owner.as_deref() != Some(new) => {
                        let from = prop.owner.replace(new.to_owned());
                        PropEvent::Reassigned { from }
                    }
                    _ => PropEvent::Matched,
                }
            }
        }
    }
    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.kept.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.kept.contains_key(name)
    }
    pub fn owned_by(&self, role: &str) -> Vec<String> {
        let mut owned: Vec<String> = self
            .kept
            .values()
            .filter(|p| p.owner.as_deref() == Some(role))
            .map(|p| p.name.clone())
            .collect();
        owned.sort();
        owned
    }
    pub fn iter(&self) -> impl Iterator<Item = &Prop> {
        self.kept.values()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
}

// ------------- Backdrop -------------
/// Left/Middle/Right composite, recorded once per scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backdrop {
    left: String,
    middle: String,
    right: String,
}

impl Backdrop {
    pub fn parse(line: &str) -> Backdrop {
        let mut parts = line.split('|').map(str::trim);
        Backdrop {
            left: parts.next().unwrap_or("").to_owned(),
            middle: parts.next().unwrap_or("").to_owned(),
            right: parts.next().unwrap_or("").to_owned(),
        }
    }
    pub fn left(&self) -> &str {
        &self.left
    }
    pub fn middle(&self) -> &str {
        &self.middle
    }
    pub fn right(&self) -> &str {
        &self.right
    }
}

impl fmt::Display for Backdrop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {} | {}", self.left, self.middle, self.right)
    }
}

// ------------- Tallies -------------
/// Usage counters per (category, key). The first count announces a value,
/// repeats acknowledge it.
#[derive(Debug, Default)]
pub struct TallyKeeper {
    counts: HashMap<(String, String), u32, NameHasher>,
    keys: BTreeMap<String, BTreeSet<String>>,
}

impl TallyKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn count(&mut self, category: &str, key: &str) -> u32 {
        let slot = self
            .counts
            .entry((category.to_owned(), key.to_owned()))
            .or_insert(0);
        *slot += 1;
        self.keys
            .entry(category.to_owned())
            .or_default()
            .insert(key.to_owned());
        *slot
    }
    pub fn get(&self, category: &str, key: &str) -> u32 {
        self.counts
            .get(&(category.to_owned(), key.to_owned()))
            .copied()
            .unwrap_or(0)
    }
    pub fn categories(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }
    pub fn keys(&self, category: &str) -> Vec<&str> {
        self.keys
            .get(category)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

// ------------- Name forging -------------
/// Deterministic `Category<N>` identifiers for anonymous entities.
/// Allocation is memoized per (category, raw name, owning context) so the
/// same combination always resolves to the same identifier, and candidates
/// colliding with user-supplied names are skipped.
#[derive(Debug, Default)]
pub struct NameForge {
    counters: HashMap<String, u32, NameHasher>,
    memo: HashMap<(String, String, String), String, NameHasher>,
}

impl NameForge {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn allocate<F>(&mut self, raw: Option<&str>, category: &str, context: &str, is_taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let key = (
            category.to_owned(),
            raw.unwrap_or("").to_owned(),
            context.to_owned(),
        );
        if let Some(existing) = self.memo.get(&key) {
            return existing.clone();
        }
        loop {
            let counter = self.counters.entry(category.to_owned()).or_insert(0);
            *counter += 1;
            let candidate = format!("{}{}", category, counter);
            if !is_taken(&candidate) {
                self.memo.insert(key, candidate.clone());
                return candidate;
            }
        }
    }
}

// ------------- Stage -------------
/// Dropped role bookkeeping handed back to the parser for note emission.
#[derive(Debug, Clone)]
pub struct DroppedRole {
    pub name: String,
    pub costume: Option<String>,
    pub props: Vec<String>,
}

/// Entities newly on stage after a cast line.
#[derive(Debug, Clone, Default)]
pub struct Arrivals {
    pub persons: Vec<String>,
    pub puppets: Vec<String>,
}

/// Entities leaving the stage at scene close.
#[derive(Debug, Clone, Default)]
pub struct Departures {
    pub dropped: Vec<DroppedRole>,
    pub persons: Vec<String>,
    pub puppets: Vec<String>,
}

/// The entity store: one keeper per category plus on-stage bookkeeping.
pub struct Stage {
    roles: RoleKeeper,
    puppets: PuppetKeeper,
    wardrobe: Wardrobe,
    props: PropKeeper,
    tallies: TallyKeeper,
    forge: NameForge,
    active_roles: BTreeSet<String>,
    persons_on: BTreeSet<String>,
    puppets_on: BTreeSet<String>,
}

impl Stage {
    pub fn new() -> Self {
        Self {
            roles: RoleKeeper::new(),
            puppets: PuppetKeeper::new(),
            wardrobe: Wardrobe::new(),
            props: PropKeeper::new(),
            tallies: TallyKeeper::new(),
            forge: NameForge::new(),
            active_roles: BTreeSet::new(),
            persons_on: BTreeSet::new(),
            puppets_on: BTreeSet::new(),
        }
    }
    // accessors for the owned keepers
    pub fn roles(&self) -> &RoleKeeper {
        &self.roles
    }
    pub fn puppets(&self) -> &PuppetKeeper {
        &self.puppets
    }
    pub fn wardrobe(&self) -> &Wardrobe {
        &self.wardrobe
    }
    pub fn props(&self) -> &PropKeeper {
        &self.props
    }
    pub fn tallies(&self) -> &TallyKeeper {
        &self.tallies
    }
    pub fn active_roles(&self) -> &BTreeSet<String> {
        &self.active_roles
    }

    /// Merge a cast declaration, pair the puppet and mark the role active.
    pub fn register_role(&mut self, decl: RoleDecl, scene: usize) -> RoleUpdate {
        let name = decl.name.clone();
        let mut update = self.roles.keep(decl, scene);
        if let Some(puppet) = self.roles.get(&name).and_then(|r| r.puppet()).map(str::to_owned) {
            if let Some(taken_from) = self.puppets.assign(&puppet, &name) {
                update.handover = Some((puppet, taken_from));
            }
        }
        self.active_roles.insert(name);
        update
    }

    /// On-stage arrivals implied by a role's current record.
    pub fn enter(&mut self, role: &str) -> Arrivals {
        let mut arrivals = Arrivals::default();
        let Some(record) = self.roles.get(role) else {
            return arrivals;
        };
        let persons = record.persons();
        let puppet = record.puppet().map(str::to_owned);
        for person in persons {
            if self.persons_on.insert(person.clone()) {
                arrivals.persons.push(person);
            }
        }
        if let Some(puppet) = puppet {
            if self.puppets_on.insert(puppet.clone()) {
                arrivals.puppets.push(puppet);
            }
        }
        arrivals
    }

    /// Apply a costume request. `Unset` inherits whatever the role has on,
    /// which yields the keep transition when a cast repeats across scenes.
    pub fn assign_costume(&mut self, role: &str, request: &Attr) -> Option<CostumeEvent> {
        let wanted = match request {
            Attr::Named(costume) => Some(costume.clone()),
            Attr::Absent => None,
            Attr::Unset => self.wardrobe.current(role).map(str::to_owned),
        };
        self.wardrobe.assign(role, wanted)
    }

    /// Remove a role from the on-stage bookkeeping; the registry record is
    /// retained for history lookups.
    pub fn drop_role(&mut self, name: &str) -> DroppedRole {
        let costume = self.wardrobe.remove(name);
        let props = self.props.owned_by(name);
        self.puppets.unpair_role(name);
        self.active_roles.remove(name);
        DroppedRole { name: name.to_owned(), costume, props }
    }

    /// Close-of-scene settlement: drop roles absent from the scene's cast,
    /// then diff the person/puppet sets still required against who is on.
    pub fn settle(&mut self, cast: &BTreeSet<String>) -> Departures {
        let mut departures = Departures::default();
        let leaving: Vec<String> = self
            .active_roles
            .iter()
            .filter(|name| !cast.contains(*name))
            .cloned()
            .collect();
        for name in leaving {
            departures.dropped.push(self.drop_role(&name));
        }
        let mut persons_needed = BTreeSet::new();
        let mut puppets_needed = BTreeSet::new();
        for name in &self.active_roles {
            if let Some(record) = self.roles.get(name) {
                persons_needed.extend(record.persons());
                if let Some(puppet) = record.puppet() {
                    puppets_needed.insert(puppet.to_owned());
                }
            }
        }
        departures.persons = self
            .persons_on
            .difference(&persons_needed)
            .cloned()
            .collect();
        for person in &departures.persons {
            self.persons_on.remove(person);
        }
        departures.puppets = self
            .puppets_on
            .difference(&puppets_needed)
            .cloned()
            .collect();
        for puppet in &departures.puppets {
            self.puppets_on.remove(puppet);
        }
        departures
    }

    /// Keep a prop reference (declaration or cue).
    pub fn keep_prop(&mut self, name: &str, kind: PropKind, owner: Option<&str>, scene: usize) -> PropEvent {
        self.props.keep(name, kind, owner, scene)
    }

    /// Count a usage of a single-value cue key. 1 means first use.
    pub fn count(&mut self, category: &str, key: &str) -> u32 {
        self.tallies.count(category, key)
    }

    /// Forge a stable synthetic identifier that cannot collide with any
    /// user-supplied entity name.
    pub fn allocate_name(&mut self, raw: Option<&str>, category: &str, context: &str) -> String {
        let Self { roles, puppets, wardrobe, props, forge, .. } = self;
        forge.allocate(raw, category, context, |candidate| {
            roles.contains(candidate)
                || puppets.known(candidate)
                || wardrobe.known(candidate)
                || props.contains(candidate)
        })
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}
