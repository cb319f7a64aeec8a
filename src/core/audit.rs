use crate::core::router::Router;
use crate::core::validator::RoutingValidator;
use crate::domain::model::{Catalog, MatchTier, Region, RoutingDecision, Validation};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Filtering and sampling knobs for one audit run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditSettings {
    pub min_rating: u8,
    pub example_limit: usize,
    pub mri_only: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            min_rating: 5,
            example_limit: 20,
            mri_only: true,
        }
    }
}

/// One deduplicated (scenario, procedure) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditPair {
    pub region: Region,
    pub scenario_id: String,
    pub scenario: String,
    pub procedure: String,
    pub rating: u8,
    pub contrast: bool,
}

/// Collect MRI-like pairs at or above the rating floor, deduplicated on
/// (procedure name, scenario name). Blank procedure names are skipped.
/// Catalog order is kept and the first occurrence wins.
pub fn collect_pairs(catalog: &Catalog, settings: &AuditSettings) -> Vec<AuditPair> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut pairs = Vec::new();

    for scenario in &catalog.scenarios {
        for procedure in &scenario.procedures {
            if procedure.name.trim().is_empty() {
                continue;
            }
            if settings.mri_only && !procedure.is_mri_like() {
                continue;
            }
            if procedure.rating < settings.min_rating {
                continue;
            }
            if !seen.insert((procedure.name.as_str(), scenario.name.as_str())) {
                continue;
            }
            pairs.push(AuditPair {
                region: scenario.region,
                scenario_id: scenario.id.clone(),
                scenario: scenario.name.clone(),
                procedure: procedure.name.clone(),
                rating: procedure.rating,
                contrast: procedure.needs_contrast(),
            });
        }
    }

    pairs
}

/// Exactly one bucket per pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Routed {
        decision: RoutingDecision,
        validation: Validation,
    },
    NotRouted,
    MissingProtocol {
        decision: RoutingDecision,
    },
}

/// Everything needed to classify a pair. Read-only, shareable.
#[derive(Debug, Clone)]
pub struct AuditContext {
    router: Router,
    validator: RoutingValidator,
    protocol_names: BTreeSet<String>,
    curated: HashMap<String, BTreeSet<String>>,
}

impl AuditContext {
    pub fn new(router: Router, validator: RoutingValidator, catalog: &Catalog) -> Self {
        let protocol_names = catalog.protocols.iter().map(|p| p.name.clone()).collect();

        let mut curated: HashMap<String, BTreeSet<String>> = HashMap::new();
        for protocol in &catalog.protocols {
            for matched in &protocol.scenario_matches {
                curated
                    .entry(matched.scenario_id.clone())
                    .or_default()
                    .insert(protocol.name.clone());
            }
        }

        Self {
            router,
            validator,
            protocol_names,
            curated,
        }
    }

    /// Rule-table outputs that do not exist in the protocol catalog,
    /// whether or not any pair ever reaches them.
    pub fn dangling_rule_targets(&self) -> Vec<String> {
        self.router
            .rules()
            .protocol_names()
            .into_iter()
            .filter(|name| !self.protocol_names.contains(*name))
            .map(str::to_string)
            .collect()
    }

    pub fn classify(&self, pair: &AuditPair) -> PairOutcome {
        let decision = self
            .router
            .route_in(&pair.procedure, &pair.scenario, Some(pair.region));

        let Some(protocol) = decision.protocol_name() else {
            return PairOutcome::NotRouted;
        };

        // 目錄裡找不到的協定不做解剖驗證
        if !self.protocol_names.contains(protocol) {
            return PairOutcome::MissingProtocol { decision };
        }

        let validation = self.validator.validate(&pair.procedure, Some(protocol));
        PairOutcome::Routed {
            decision,
            validation,
        }
    }

    fn curated_for(&self, scenario_id: &str) -> Option<&BTreeSet<String>> {
        self.curated.get(scenario_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub routed: usize,
    pub not_routed: usize,
    pub missing_protocol: usize,
    pub mismatched: usize,
}

impl BucketCounts {
    fn add(&mut self, other: &BucketCounts) {
        self.routed += other.routed;
        self.not_routed += other.not_routed;
        self.missing_protocol += other.missing_protocol;
        self.mismatched += other.mismatched;
    }

    pub fn total(&self) -> usize {
        self.routed + self.not_routed + self.missing_protocol
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchExample {
    pub procedure: String,
    pub scenario: String,
    pub protocol: String,
    pub match_tier: MatchTier,
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnroutedExample {
    pub region: Region,
    pub scenario_id: String,
    pub scenario: String,
    pub procedure: String,
    pub rating: u8,
    pub contrast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingProtocolExample {
    pub procedure: String,
    pub scenario: String,
    pub routed_to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CuratedDisagreement {
    pub scenario_id: String,
    pub scenario: String,
    pub procedure: String,
    pub routed_to: String,
    pub curated: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingMapEntry {
    pub protocol: String,
    pub match_tier: MatchTier,
}

/// Partial result over a slice of pairs.
///
/// `merge` is associative: counters add, first-seen maps keep the left
/// value, example lists concatenate and are capped at `example_limit`.
/// Merging partitions in input order reproduces the sequential result.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditAggregate {
    example_limit: usize,
    pub totals: BucketCounts,
    pub pairs: usize,
    pub by_protocol: BTreeMap<String, usize>,
    pub by_region: BTreeMap<Region, BucketCounts>,
    pub by_tier: BTreeMap<MatchTier, usize>,
    pub by_rule: BTreeMap<String, usize>,
    pub missing_protocols: BTreeMap<String, usize>,
    pub routing_map: BTreeMap<String, RoutingMapEntry>,
    routing_map_order: Vec<String>,
    pub curated_pairs: usize,
    pub curated_agreements: usize,
    pub mismatch_examples: Vec<MismatchExample>,
    pub unrouted_examples: Vec<UnroutedExample>,
    pub missing_examples: Vec<MissingProtocolExample>,
    pub curated_disagreements: Vec<CuratedDisagreement>,
    /// Every unrouted pair, uncapped, for the CSV export.
    pub unrouted: Vec<UnroutedExample>,
}

impl AuditAggregate {
    pub fn new(example_limit: usize) -> Self {
        Self {
            example_limit,
            totals: BucketCounts::default(),
            pairs: 0,
            by_protocol: BTreeMap::new(),
            by_region: BTreeMap::new(),
            by_tier: BTreeMap::new(),
            by_rule: BTreeMap::new(),
            missing_protocols: BTreeMap::new(),
            routing_map: BTreeMap::new(),
            routing_map_order: Vec::new(),
            curated_pairs: 0,
            curated_agreements: 0,
            mismatch_examples: Vec::new(),
            unrouted_examples: Vec::new(),
            missing_examples: Vec::new(),
            curated_disagreements: Vec::new(),
            unrouted: Vec::new(),
        }
    }

    pub fn record(&mut self, ctx: &AuditContext, pair: &AuditPair, outcome: PairOutcome) {
        self.pairs += 1;
        let mut counts = BucketCounts::default();

        match outcome {
            PairOutcome::NotRouted => {
                counts.not_routed = 1;
                *self.by_tier.entry(MatchTier::None).or_default() += 1;
                let example = UnroutedExample {
                    region: pair.region,
                    scenario_id: pair.scenario_id.clone(),
                    scenario: pair.scenario.clone(),
                    procedure: pair.procedure.clone(),
                    rating: pair.rating,
                    contrast: pair.contrast,
                };
                push_capped(&mut self.unrouted_examples, example.clone(), self.example_limit);
                self.unrouted.push(example);
            }
            PairOutcome::MissingProtocol { decision } => {
                counts.missing_protocol = 1;
                let name = decision.protocol_name().unwrap_or_default().to_string();
                *self.missing_protocols.entry(name.clone()).or_default() += 1;
                push_capped(
                    &mut self.missing_examples,
                    MissingProtocolExample {
                        procedure: pair.procedure.clone(),
                        scenario: pair.scenario.clone(),
                        routed_to: name,
                    },
                    self.example_limit,
                );
            }
            PairOutcome::Routed {
                decision,
                validation,
            } => {
                counts.routed = 1;
                let protocol = decision.protocol_name().unwrap_or_default().to_string();
                *self.by_protocol.entry(protocol.clone()).or_default() += 1;
                *self.by_tier.entry(decision.match_tier()).or_default() += 1;
                if let Some(rule) = decision.rule() {
                    *self.by_rule.entry(rule.to_string()).or_default() += 1;
                }

                if !validation.consistent {
                    counts.mismatched = 1;
                    push_capped(
                        &mut self.mismatch_examples,
                        MismatchExample {
                            procedure: pair.procedure.clone(),
                            scenario: pair.scenario.clone(),
                            protocol: protocol.clone(),
                            match_tier: decision.match_tier(),
                            concerns: validation.concerns,
                        },
                        self.example_limit,
                    );
                }

                if let Some(curated) = ctx.curated_for(&pair.scenario_id) {
                    self.curated_pairs += 1;
                    if curated.contains(&protocol) {
                        self.curated_agreements += 1;
                    } else {
                        push_capped(
                            &mut self.curated_disagreements,
                            CuratedDisagreement {
                                scenario_id: pair.scenario_id.clone(),
                                scenario: pair.scenario.clone(),
                                procedure: pair.procedure.clone(),
                                routed_to: protocol.clone(),
                                curated: curated.iter().cloned().collect(),
                            },
                            self.example_limit,
                        );
                    }
                }

                if !self.routing_map.contains_key(&pair.procedure) {
                    self.routing_map_order.push(pair.procedure.clone());
                    self.routing_map.insert(
                        pair.procedure.clone(),
                        RoutingMapEntry {
                            protocol,
                            match_tier: decision.match_tier(),
                        },
                    );
                }
            }
        }

        self.totals.add(&counts);
        self.by_region.entry(pair.region).or_default().add(&counts);
    }

    pub fn merge(mut self, other: AuditAggregate) -> AuditAggregate {
        self.pairs += other.pairs;
        self.totals.add(&other.totals);
        add_counts(&mut self.by_protocol, other.by_protocol);
        add_counts(&mut self.by_tier, other.by_tier);
        add_counts(&mut self.by_rule, other.by_rule);
        add_counts(&mut self.missing_protocols, other.missing_protocols);
        for (region, counts) in other.by_region {
            self.by_region.entry(region).or_default().add(&counts);
        }

        let mut other_map = other.routing_map;
        for procedure in other.routing_map_order {
            if self.routing_map.contains_key(&procedure) {
                continue;
            }
            if let Some(entry) = other_map.remove(&procedure) {
                self.routing_map_order.push(procedure.clone());
                self.routing_map.insert(procedure, entry);
            }
        }

        self.curated_pairs += other.curated_pairs;
        self.curated_agreements += other.curated_agreements;

        let limit = self.example_limit;
        extend_capped(&mut self.mismatch_examples, other.mismatch_examples, limit);
        extend_capped(&mut self.unrouted_examples, other.unrouted_examples, limit);
        extend_capped(&mut self.missing_examples, other.missing_examples, limit);
        extend_capped(&mut self.curated_disagreements, other.curated_disagreements, limit);
        self.unrouted.extend(other.unrouted);
        self
    }

    /// Procedures in the order they were first routed.
    pub fn routing_map_in_order(&self) -> impl Iterator<Item = (&str, &RoutingMapEntry)> {
        self.routing_map_order
            .iter()
            .filter_map(|p| self.routing_map.get(p).map(|e| (p.as_str(), e)))
    }
}

fn push_capped<T>(list: &mut Vec<T>, item: T, limit: usize) {
    if list.len() < limit {
        list.push(item);
    }
}

fn extend_capped<T>(list: &mut Vec<T>, items: Vec<T>, limit: usize) {
    let room = limit.saturating_sub(list.len());
    list.extend(items.into_iter().take(room));
}

fn add_counts<K: Ord>(into: &mut BTreeMap<K, usize>, from: BTreeMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}

/// Classify a slice of pairs into one aggregate, in order.
pub fn audit_pairs(ctx: &AuditContext, pairs: &[AuditPair], example_limit: usize) -> AuditAggregate {
    let mut aggregate = AuditAggregate::new(example_limit);
    for pair in pairs {
        let outcome = ctx.classify(pair);
        aggregate.record(ctx, pair, outcome);
    }
    aggregate
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSummary {
    pub pairs: usize,
    pub routed: usize,
    pub not_routed: usize,
    pub missing_protocol: usize,
    pub mismatched: usize,
    /// routed / pairs, in percent, one decimal
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CuratedSummary {
    pub pairs_with_curated_match: usize,
    pub agreements: usize,
    pub disagreements: Vec<CuratedDisagreement>,
}

/// Final, serialisable audit report. No timestamps: the same catalog
/// always yields the same JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub summary: AuditSummary,
    pub by_protocol: BTreeMap<String, usize>,
    pub by_region: BTreeMap<Region, BucketCounts>,
    pub by_tier: BTreeMap<MatchTier, usize>,
    pub by_rule: BTreeMap<String, usize>,
    pub missing_protocols: BTreeMap<String, usize>,
    pub dangling_rule_targets: Vec<String>,
    pub mismatches: Vec<MismatchExample>,
    pub not_routed: Vec<UnroutedExample>,
    pub missing_protocol_examples: Vec<MissingProtocolExample>,
    pub curated: CuratedSummary,
    pub procedure_routing: BTreeMap<String, RoutingMapEntry>,
    #[serde(skip)]
    pub routing_rows: Vec<(String, RoutingMapEntry)>,
    #[serde(skip)]
    pub unrouted_rows: Vec<UnroutedExample>,
}

impl AuditReport {
    pub fn from_aggregate(ctx: &AuditContext, aggregate: AuditAggregate) -> Self {
        let coverage_percent = if aggregate.pairs == 0 {
            0.0
        } else {
            let raw = aggregate.totals.routed as f64 * 100.0 / aggregate.pairs as f64;
            (raw * 10.0).round() / 10.0
        };

        let routing_rows = aggregate
            .routing_map_in_order()
            .map(|(procedure, entry)| (procedure.to_string(), entry.clone()))
            .collect();

        Self {
            summary: AuditSummary {
                pairs: aggregate.pairs,
                routed: aggregate.totals.routed,
                not_routed: aggregate.totals.not_routed,
                missing_protocol: aggregate.totals.missing_protocol,
                mismatched: aggregate.totals.mismatched,
                coverage_percent,
            },
            by_protocol: aggregate.by_protocol,
            by_region: aggregate.by_region,
            by_tier: aggregate.by_tier,
            by_rule: aggregate.by_rule,
            missing_protocols: aggregate.missing_protocols,
            dangling_rule_targets: ctx.dangling_rule_targets(),
            mismatches: aggregate.mismatch_examples,
            not_routed: aggregate.unrouted_examples,
            missing_protocol_examples: aggregate.missing_examples,
            curated: CuratedSummary {
                pairs_with_curated_match: aggregate.curated_pairs,
                agreements: aggregate.curated_agreements,
                disagreements: aggregate.curated_disagreements,
            },
            procedure_routing: aggregate.routing_map,
            routing_rows,
            unrouted_rows: aggregate.unrouted,
        }
    }
}

/// Single-threaded audit over a whole catalog.
pub fn run_audit(ctx: &AuditContext, catalog: &Catalog, settings: &AuditSettings) -> AuditReport {
    let pairs = collect_pairs(catalog, settings);
    let aggregate = audit_pairs(ctx, &pairs, settings.example_limit);
    AuditReport::from_aggregate(ctx, aggregate)
}
