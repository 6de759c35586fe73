// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Cross-provider response equivalence.
//!
//! Two adapters fed semantically identical fixtures must produce canonical
//! responses that agree on finish reason, content ordering, and (within a
//! tolerance) token counts.  Provider-assigned ids are excluded from the
//! comparison.

use crate::{ContentBlock, Response};

/// Token counts may differ across providers for the same content; this is
/// the maximum allowed relative difference.
const TOKEN_TOLERANCE: f64 = 0.05;

/// Compare two canonical responses for provider-independent equivalence.
///
/// Returns `Ok(())` or a description of the first mismatch.
pub fn responses_equivalent(a: &Response, b: &Response) -> Result<(), String> {
    if a.finish_reason != b.finish_reason {
        return Err(format!(
            "finish reason mismatch: {:?} vs {:?}",
            a.finish_reason, b.finish_reason
        ));
    }
    if a.blocks.len() != b.blocks.len() {
        return Err(format!(
            "block count mismatch: {} vs {}",
            a.blocks.len(),
            b.blocks.len()
        ));
    }
    for (i, (ba, bb)) in a.blocks.iter().zip(&b.blocks).enumerate() {
        block_equivalent(ba, bb).map_err(|e| format!("block {i}: {e}"))?;
    }
    tokens_within_tolerance(a.usage.input_tokens, b.usage.input_tokens)
        .map_err(|e| format!("input tokens: {e}"))?;
    tokens_within_tolerance(a.usage.output_tokens, b.usage.output_tokens)
        .map_err(|e| format!("output tokens: {e}"))?;
    Ok(())
}

fn block_equivalent(a: &ContentBlock, b: &ContentBlock) -> Result<(), String> {
    match (a, b) {
        (ContentBlock::Text { text: ta }, ContentBlock::Text { text: tb }) => {
            if ta == tb {
                Ok(())
            } else {
                Err(format!("text mismatch: {ta:?} vs {tb:?}"))
            }
        }
        (ContentBlock::Thinking { .. }, ContentBlock::Thinking { .. }) => Ok(()),
        (
            ContentBlock::ToolCall { name: na, arguments: aa, .. },
            ContentBlock::ToolCall { name: nb, arguments: ab, .. },
        ) => {
            if na != nb {
                return Err(format!("tool name mismatch: {na} vs {nb}"));
            }
            // Compare parsed argument objects so key order is irrelevant.
            let va: serde_json::Value =
                serde_json::from_str(aa).map_err(|e| format!("left arguments unparseable: {e}"))?;
            let vb: serde_json::Value =
                serde_json::from_str(ab).map_err(|e| format!("right arguments unparseable: {e}"))?;
            if va == vb {
                Ok(())
            } else {
                Err(format!("tool arguments mismatch: {va} vs {vb}"))
            }
        }
        (
            ContentBlock::ToolResult { content: ca, is_error: ea, .. },
            ContentBlock::ToolResult { content: cb, is_error: eb, .. },
        ) => {
            if ca == cb && ea == eb {
                Ok(())
            } else {
                Err("tool result mismatch".into())
            }
        }
        (ContentBlock::RedactedThinking { .. }, ContentBlock::RedactedThinking { .. }) => Ok(()),
        _ => Err(format!("block kind mismatch: {a:?} vs {b:?}")),
    }
}

fn tokens_within_tolerance(a: u32, b: u32) -> Result<(), String> {
    if a == b {
        return Ok(());
    }
    let max = a.max(b) as f64;
    if max == 0.0 {
        return Ok(());
    }
    let diff = (a as f64 - b as f64).abs() / max;
    if diff <= TOKEN_TOLERANCE {
        Ok(())
    } else {
        Err(format!("{a} vs {b} differ by {:.1}%", diff * 100.0))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
