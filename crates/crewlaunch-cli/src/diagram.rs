//! SVG diagram of a crew: one box per task in execution order, with the
//! assigned agent, and arrows for context hand-offs.

use std::fmt::Write;

use crewlaunch_core::adapter::markup::escape_html;
use crewlaunch_core::crew::Crew;

const BOX_W: usize = 220;
const BOX_H: usize = 90;
const GAP: usize = 70;
const MARGIN: usize = 30;
const ARC_STEP: usize = 28;

/// Fill colours cycled over agents.
const AGENT_FILLS: [&str; 4] = ["#fde2e1", "#dff5e1", "#dde8fb", "#fdebd3"];

/// Render `crew` as a standalone SVG document.
pub fn render_svg(crew: &Crew) -> String {
    let n = crew.tasks.len().max(1);
    let width = MARGIN * 2 + n * BOX_W + (n - 1) * GAP;
    let max_span = crew
        .tasks
        .iter()
        .enumerate()
        .flat_map(|(i, t)| t.context.iter().map(move |&c| i.saturating_sub(c)))
        .max()
        .unwrap_or(0);
    let arc_room = if max_span > 1 { max_span * ARC_STEP } else { 0 };
    let height = MARGIN * 2 + BOX_H + arc_room + 20;
    let top = MARGIN;

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\" font-family=\"sans-serif\" font-size=\"13\">\
         <defs><marker id=\"arrow\" markerWidth=\"10\" markerHeight=\"10\" refX=\"9\" refY=\"5\" \
         orient=\"auto\"><path d=\"M0,0 L10,5 L0,10 z\" fill=\"#555\"/></marker></defs>\
         <title>{}</title>",
        escape_html(&crew.name)
    );

    let x_of = |i: usize| MARGIN + i * (BOX_W + GAP);

    for (i, task) in crew.tasks.iter().enumerate() {
        let x = x_of(i);
        let agent = crew.agent_for(task);
        let fill = AGENT_FILLS[task.agent % AGENT_FILLS.len()];
        let _ = write!(
            svg,
            "<g class=\"task\"><rect x=\"{x}\" y=\"{top}\" width=\"{BOX_W}\" height=\"{BOX_H}\" \
             rx=\"10\" fill=\"{fill}\" stroke=\"#444\"/>\
             <text x=\"{cx}\" y=\"{ty1}\" text-anchor=\"middle\" font-weight=\"bold\">{role}</text>\
             <text x=\"{cx}\" y=\"{ty2}\" text-anchor=\"middle\">{step}. {name}</text>\
             <text x=\"{cx}\" y=\"{ty3}\" text-anchor=\"middle\" fill=\"#666\">{tools}</text></g>",
            cx = x + BOX_W / 2,
            ty1 = top + 30,
            ty2 = top + 52,
            ty3 = top + 72,
            role = escape_html(&agent.role),
            step = i + 1,
            name = escape_html(&task.name),
            tools = if agent.tools.is_empty() {
                String::new()
            } else {
                escape_html(&format!("tools: {}", agent.tools.join(", ")))
            },
        );
    }

    for (i, task) in crew.tasks.iter().enumerate() {
        for &from in &task.context {
            if from >= i {
                continue;
            }
            let span = i - from;
            if span == 1 {
                let x1 = x_of(from) + BOX_W;
                let x2 = x_of(i);
                let y = top + BOX_H / 2;
                let _ = write!(
                    svg,
                    "<line x1=\"{x1}\" y1=\"{y}\" x2=\"{x2}\" y2=\"{y}\" stroke=\"#555\" \
                     stroke-width=\"2\" marker-end=\"url(#arrow)\"/>"
                );
            } else {
                let x1 = x_of(from) + BOX_W / 2;
                let x2 = x_of(i) + BOX_W / 2;
                let y = top + BOX_H;
                let dip = y + span * ARC_STEP;
                let _ = write!(
                    svg,
                    "<path d=\"M{x1},{y} C{x1},{dip} {x2},{dip} {x2},{y}\" fill=\"none\" \
                     stroke=\"#888\" stroke-dasharray=\"5,4\" stroke-width=\"1.5\" \
                     marker-end=\"url(#arrow)\"/>"
                );
            }
        }
    }

    svg.push_str("</svg>");
    svg
}
