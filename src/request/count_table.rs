use crate::{Status, StatusCode, recorder::TimeRecorder};

use super::{Context, Output, Phase, RequestKind, translate, validate_root_table};

const KIND: RequestKind = RequestKind::CountTable;

pub(super) fn execute(
    ctx: &Context,
    table: &str,
    rc: &mut TimeRecorder,
) -> Result<Output, Status> {
    // step 1: check arguments, root tables only
    validate_root_table(ctx, KIND, table)?;
    rc.section("check validation");

    // step 2: get row count
    let count = ctx
        .faults()
        .intercept(KIND.point(Phase::Delegate), || ctx.engine().row_count(table))
        .map_err(|err| translate(err, table))?;
    let count = i64::try_from(count).map_err(|_| {
        Status::new(
            StatusCode::EngineFailure,
            format!("row count of table '{table}' out of range: {count}"),
        )
    })?;

    Ok(Output::RowCount(count))
}

#[cfg(test)]
mod tests {
    use crate::{
        EngineError, RequestHandle, StatusCode,
        fault::Fault,
        request::testing::harness,
    };

    use super::*;

    #[test]
    fn empty_table_counts_zero() {
        let h = harness();

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert!(reply.is_ok());
        assert_eq!(reply.row_count(), Some(0));
    }

    #[test]
    fn counts_root_and_partitions() {
        let h = harness();
        h.engine.inner.insert("t1", 12).unwrap();
        h.engine.inner.insert("t1_p1", 30).unwrap();

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(reply.row_count(), Some(42));
        assert_eq!(h.engine.calls(), vec!["describe_table(t1)", "row_count(t1)"]);
    }

    #[test]
    fn repeated_counts_agree() {
        let h = harness();
        h.engine.inner.insert("t1", 7).unwrap();

        let first = RequestHandle::count_table(&h.ctx, "t1").execute();
        let second = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(first, second);
        assert_eq!(first.row_count(), Some(7));
    }

    #[test]
    fn not_found_during_count_is_remapped() {
        let h = harness();
        h.engine
            .fail("row_count", EngineError::NotFound("t1".into()));

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        assert_eq!(reply.status().message(), "table 't1' does not exist");
        assert_eq!(reply.row_count(), None);
    }

    #[test]
    fn not_found_fault_overrides_engine() {
        let h = harness();
        h.engine.inner.insert("t1", 5).unwrap();
        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::NotFound("t1".into())),
        );

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();
        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        // the real step is skipped
        assert_eq!(h.engine.calls(), vec!["describe_table(t1)"]);

        h.faults.disarm(KIND.point(Phase::Delegate));
        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();
        assert_eq!(reply.row_count(), Some(5));
    }

    #[test]
    fn unnamed_not_found_reports_requested_table() {
        let h = harness();
        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::NotFound(String::new())),
        );

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        assert_eq!(reply.status().message(), "table 't1' does not exist");
    }

    #[test]
    fn overflowing_count_is_engine_failure() {
        let h = harness();
        h.engine.inner.insert("t1", u64::MAX).unwrap();
        h.engine.inner.insert("t1_p1", 1).unwrap();

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::EngineFailure);
        assert_eq!(reply.row_count(), None);
    }

    #[test]
    fn status_error_fault_is_returned() {
        let h = harness();
        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::Unexpected("forced".into())),
        );

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::Unexpected);
        assert_eq!(reply.status().message(), "forced");
    }

    #[test]
    fn panic_during_count_is_unexpected() {
        let h = harness();
        h.faults
            .arm(KIND.point(Phase::Delegate), Fault::Panic("engine exploded".into()));

        let reply = RequestHandle::count_table(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::Unexpected);
        assert_eq!(reply.status().message(), "engine exploded");
        assert_eq!(reply.output(), None);
        // the recorder scope still closes
        assert_eq!(
            h.sink.labels().last().map(String::as_str),
            Some("CountTableRequest(table=t1): done")
        );
    }
}
