use scimstress::entry;
use scimstress::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
