use anyhow::{bail, Context, Result};
use clap::Parser;
use protocol_router::core::rules::RuleGroup;
use protocol_router::domain::model::Region;
use protocol_router::utils::logger;
use protocol_router::{MatchTier, Router, RoutingDecision, RoutingValidator, Validation};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "route")]
#[command(about = "Route one procedure/scenario pair and explain the decision")]
struct Args {
    /// Procedure name, e.g. "MRI knee without IV contrast"
    #[arg(short, long)]
    procedure: String,

    /// Clinical scenario text
    #[arg(short, long, default_value = "")]
    scenario: String,

    /// Catalog region (neuro, spine, chest, abdomen, msk, vascular, breast, peds)
    #[arg(short, long, default_value = "")]
    region: String,

    /// Fail when the region is not one of the known values
    #[arg(long)]
    strict_region: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct MatchedRule<'a> {
    id: &'a str,
    group: RuleGroup,
    protocol: &'a str,
    tier: MatchTier,
}

#[derive(Serialize)]
struct Explanation<'a> {
    procedure: &'a str,
    scenario: &'a str,
    region: Option<Region>,
    decision: RoutingDecision,
    validation: Validation,
    shadowed: Vec<MatchedRule<'a>>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let region = Region::parse(&args.region);
    if args.strict_region && region.is_none() {
        bail!("unknown region '{}'", args.region);
    }

    let router = Router::standard().context("failed to build routing rules")?;
    let validator = RoutingValidator::standard();

    let decision = router.route_in(&args.procedure, &args.scenario, region);
    let validation = validator.validate(&args.procedure, decision.protocol_name());

    // 第一條是實際觸發的規則，其餘被遮蔽
    let shadowed = router
        .matching_rules(&args.procedure, &args.scenario, region)
        .into_iter()
        .skip(1)
        .map(|rule| MatchedRule {
            id: &rule.id,
            group: rule.group,
            protocol: &rule.protocol,
            tier: rule.tier,
        })
        .collect();

    let explanation = Explanation {
        procedure: &args.procedure,
        scenario: &args.scenario,
        region,
        decision,
        validation,
        shadowed,
    };

    let json = serde_json::to_string_pretty(&explanation).context("failed to encode decision")?;
    println!("{}", json);
    Ok(())
}
