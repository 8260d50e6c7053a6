// Prompt templates for nomination and response decisions.
//
// Each prompt restates the bot's own strategy, both teams and balances,
// and the rule bounds for the decision, then asks for a single JSON
// object. The opponent's strategy is never included.

use hoopdraft_core::advisor::{DecisionKind, DecisionRequest, PoolView, SeatView};
use hoopdraft_core::player::Player;

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Static system prompt shared by every decision.
pub fn system_prompt() -> String {
    "You are a fantasy basketball bidding bot in a two-bot auction draft.\n\
     \n\
     Each bot has a fixed credit budget. Bots take turns nominating a player with an \
     opening bid; the other bot then accepts, folds, or counters with a higher bid, and \
     the exchange continues until one side concedes. The leading bidder pays its bid.\n\
     \n\
     Only a bot's best players by fantasy points count toward its score, so drafting \
     extra players can still be useful to block the opponent.\n\
     \n\
     Follow the strategy you are given. Reply with exactly one JSON object and nothing else."
        .to_string()
}

/// Build the user prompt for a request.
pub fn build_prompt(request: &DecisionRequest) -> String {
    match request.kind {
        DecisionKind::Nominate => build_nomination_prompt(request),
        DecisionKind::Respond => build_response_prompt(request),
    }
}

// ---------------------------------------------------------------------------
// Nomination prompt
// ---------------------------------------------------------------------------

pub fn build_nomination_prompt(request: &DecisionRequest) -> String {
    let mut prompt = String::with_capacity(2048);
    push_strategy(&mut prompt, request);

    prompt.push_str("## AVAILABLE PLAYERS\n");
    for entry in request.available_players() {
        prompt.push_str(&format_pool_entry(entry));
        prompt.push('\n');
    }
    prompt.push('\n');

    push_teams(&mut prompt, request);

    prompt.push_str("## RULES\n");
    prompt.push_str(&format!(
        "- Pick one available player by ID and set an opening bid of at least {} credits\n\
         - Your bid CANNOT exceed your balance of {}\n\
         - Only your top {} players by fantasy points count for scoring\n\
         - Consider which players would most improve your team\n\
         - Consider blocking the opponent from getting key players\n\n",
        request.min_bid, request.me.balance, request.scored_roster_size,
    ));

    prompt.push_str("## RESPONSE FORMAT\n");
    prompt.push_str(
        "{\"player_id\": <id>, \"amount\": <credits>, \"reasoning\": \"<one or two sentences>\"}\n",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Response prompt
// ---------------------------------------------------------------------------

pub fn build_response_prompt(request: &DecisionRequest) -> String {
    let mut prompt = String::with_capacity(2048);
    push_strategy(&mut prompt, request);

    let leading_bid = request
        .negotiation
        .as_ref()
        .map(|n| n.leading_bid)
        .unwrap_or_default();
    prompt.push_str("## CURRENT BID\n");
    if let Some(player) = request.contested_player() {
        prompt.push_str(&format!(
            "Player: {} (Fantasy: {})\n",
            player.full_name(),
            player.fantasy_points
        ));
        prompt.push_str(&format!("  {}\n", format_stats(player)));
    }
    prompt.push_str(&format!(
        "Current bid: {} credits (by {})\n\n",
        leading_bid, request.opponent.name
    ));

    push_teams(&mut prompt, request);
    prompt.push_str(&format!(
        "REMAINING PLAYERS IN POOL: {}\n\n",
        request.available_players().count()
    ));

    prompt.push_str("## RULES\n");
    prompt.push_str(&format!(
        "- \"accept\" = let the bidder win this player at the current price\n\
         - \"counter\" = raise the bid (must be higher than {leading_bid}, cannot exceed your balance of {})\n\
         - \"fold\" = give up on this player, the bidder wins at the current price\n\
         - Only your top {} players by fantasy points count for scoring\n\n",
        request.me.balance, request.scored_roster_size,
    ));

    prompt.push_str("## RESPONSE FORMAT\n");
    prompt.push_str(
        "{\"action\": \"accept\" | \"counter\" | \"fold\", \"amount\": <credits if countering>, \"reasoning\": \"<one or two sentences>\"}\n",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn push_strategy(prompt: &mut String, request: &DecisionRequest) {
    prompt.push_str("## YOUR STRATEGY\n");
    prompt.push_str(&format!("\"{}\"\n\n", request.strategy.trim()));
}

fn push_teams(prompt: &mut String, request: &DecisionRequest) {
    prompt.push_str("## YOUR TEAM\n");
    prompt.push_str(&format_team(&request.me));
    prompt.push_str("## OPPONENT TEAM\n");
    prompt.push_str(&format_team(&request.opponent));
    prompt.push_str(&format!(
        "YOUR BALANCE: {} credits\nOPPONENT BALANCE: {} credits\n\n",
        request.me.balance, request.opponent.balance
    ));
}

fn format_stats(player: &Player) -> String {
    let s = &player.stats;
    format!(
        "PPG:{} RPG:{} APG:{} SPG:{} BPG:{} TOPG:{}",
        s.ppg, s.rpg, s.apg, s.spg, s.bpg, s.topg
    )
}

fn format_pool_entry(entry: &PoolView) -> String {
    let p = &entry.player;
    format!(
        "  ID:{} {} [{}] - {} Fantasy:{}",
        p.id,
        p.full_name(),
        entry.tier,
        format_stats(p),
        p.fantasy_points
    )
}

fn format_team(view: &SeatView) -> String {
    if view.roster.is_empty() {
        return "  (empty)\n".to_string();
    }
    let mut out = String::new();
    for pick in &view.roster {
        out.push_str(&format!(
            "  {} (Fantasy:{}, Cost:{})\n",
            pick.player_name, pick.fantasy_points, pick.price
        ));
    }
    out
}
