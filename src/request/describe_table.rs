use crate::{Status, recorder::TimeRecorder};

use super::{Context, Output, RequestKind, validate_root_table};

pub(super) fn execute(
    ctx: &Context,
    table: &str,
    rc: &mut TimeRecorder,
) -> Result<Output, Status> {
    let schema = validate_root_table(ctx, RequestKind::DescribeTable, table)?;
    rc.section("check validation");

    Ok(Output::Schema(schema))
}
