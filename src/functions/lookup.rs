use tracing::debug;

use super::Macro;
use crate::context::EvalContext;
use crate::encode::{encode_string, encode_uint};
use crate::format::produce_str;
use crate::scopes::{ParameterScope, StringCollector};
use crate::sestring::{MacroCode, Payload};
use crate::sources::{Cell, Level, MapInfo};
use crate::Evaluator;

/// `Sheet(name, row, column, params...)`: produces one table cell. Styled
/// string cells are evaluated with the trailing expressions as their local
/// parameters.
pub struct Sheet;

impl Macro for Sheet {
    fn code(&self) -> MacroCode {
        MacroCode::Sheet
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let mut exprs = payload.expressions();
        let (Some(name), Some(row), Some(column)) = (exprs.next(), exprs.next(), exprs.next())
        else {
            return false;
        };
        let params = exprs.remainder();
        let Some(row) = ev.resolve_uint(ctx, row) else {
            return false;
        };
        let Some(column) = ev.resolve_uint(ctx, column) else {
            return false;
        };
        let Some(name) = StringCollector::collect(ev, ctx, name) else {
            return false;
        };
        let name = String::from_utf8_lossy(&name);
        let Some(cell) = ev.sheets().get_cell(&name, ctx.language(), row, column) else {
            debug!(sheet = %name, row, column, "no such sheet cell");
            return false;
        };
        match cell {
            Cell::Bool(b) => produce_str(ctx, if b { "true" } else { "false" }),
            Cell::SeString(s) => {
                let mut scope = ParameterScope::new(ev, ctx, params);
                return ev.resolve_string(&mut scope, s.as_se_str());
            }
            other => produce_str(ctx, &other.to_string()),
        }
        true
    }
}

/// `LevelPos(level)`: place name and map coordinates of a level row,
/// formatted through the position template.
pub struct LevelPos;

const UNKNOWN_POSITION: &str = "??? ( ???  , ??? )";

impl LevelPos {
    /// Converts a world coordinate into a map coordinate (scaled by ten).
    pub fn map_coordinate(map: &MapInfo, offset: i16, value: f32) -> u32 {
        let scale = f32::from(map.size_factor) / 100.0;
        let scaled = (((value + f32::from(offset)) * scale + 1024.0) * -0.2) / scale;
        10i32.saturating_sub(scaled.floor() as i32) as u32
    }

    fn template_params(level: &Level) -> Vec<u8> {
        let name = level.place_name.as_bytes();
        let mut params = Vec::with_capacity(name.len() + 16);
        encode_string(&mut params, name);
        encode_uint(&mut params, Self::map_coordinate(&level.map, level.map.offset_x, level.x));
        encode_uint(&mut params, Self::map_coordinate(&level.map, level.map.offset_y, level.z));
        params
    }
}

impl Macro for LevelPos {
    fn code(&self) -> MacroCode {
        MacroCode::LevelPos
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let language = ctx.language();
        let level = payload
            .args::<1>()
            .and_then(|[e]| ev.resolve_uint(ctx, e))
            .and_then(|row| ev.sheets().level(language, row));
        let template = ev
            .sheets()
            .get_cell("Addon", language, ev.options().level_pos_template_row, 0);
        let (Some(level), Some(Cell::SeString(template))) = (level, template) else {
            debug!("level position unavailable");
            produce_str(ctx, UNKNOWN_POSITION);
            return false;
        };
        let params = Self::template_params(&level);
        let mut scope = ParameterScope::new(ev, ctx, &params);
        ev.resolve_string(&mut scope, template.as_se_str())
    }
}
