use crate::{Status, recorder::TimeRecorder};

use super::{Context, Output, Phase, RequestKind, translate, validate_root_table};

const KIND: RequestKind = RequestKind::DropIndex;

pub(super) fn execute(
    ctx: &Context,
    table: &str,
    rc: &mut TimeRecorder,
) -> Result<Output, Status> {
    // step 1: check arguments, root tables only
    validate_root_table(ctx, KIND, table)?;
    rc.section("check validation");

    // step 2: drop index
    ctx.faults()
        .intercept(KIND.point(Phase::Delegate), || ctx.engine().drop_index(table))
        .map_err(|err| translate(err, table))?;

    Ok(Output::Unit)
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
    fn drops_index_of_root_table() {
        let h = harness();
        h.engine.inner.build_index("t1").unwrap();

        let reply = RequestHandle::drop_index(&h.ctx, "t1").execute();

        assert!(reply.is_ok());
        assert_eq!(reply.output(), Some(&Output::Unit));
        assert!(!h.engine.inner.has_index("t1").unwrap());
    }

    #[test]
    fn missing_table() {
        let h = harness();

        let reply = RequestHandle::drop_index(&h.ctx, "missing").execute();

        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        assert_eq!(h.engine.calls(), vec!["describe_table(missing)"]);
    }

    #[test]
    fn partition_keeps_its_index() {
        let h = harness();
        h.engine.inner.build_index("t1_p1").unwrap();

        let reply = RequestHandle::drop_index(&h.ctx, "t1_p1").execute();

        assert_eq!(reply.status().code(), StatusCode::InvalidTarget);
        assert!(h.engine.inner.has_index("t1_p1").unwrap());
    }

    #[test]
    fn engine_failure_is_preserved() {
        let h = harness();
        h.engine
            .fail("drop_index", EngineError::Failure("index locked".into()));

        let reply = RequestHandle::drop_index(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::EngineFailure);
        assert_eq!(reply.status().message(), "index locked");
    }

    #[test]
    fn drop_fault() {
        let h = harness();
        h.engine.inner.build_index("t1").unwrap();
        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::Unexpected("drop index fail".into())),
        );

        let reply = RequestHandle::drop_index(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::Unexpected);
        assert!(h.engine.inner.has_index("t1").unwrap());
    }

    #[test]
    fn not_found_names_requested_table() {
        let h = harness();
        h.engine
            .fail("drop_index", EngineError::NotFound("t1_shadow".into()));

        let reply = RequestHandle::drop_index(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        assert_eq!(reply.status().message(), "table 't1' does not exist");
    }

    #[test]
    fn describe_fault_is_translated() {
        let h = harness();
        h.faults.arm(
            KIND.point(Phase::Describe),
            Fault::Engine(EngineError::Failure("table not exist".into())),
        );

        let reply = RequestHandle::drop_index(&h.ctx, "t1").execute();

        assert_eq!(reply.status().code(), StatusCode::EngineFailure);
        assert!(h.engine.calls().is_empty());
    }
}
